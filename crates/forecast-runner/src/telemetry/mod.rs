//! Cross-run telemetry aggregation.
//!
//! - [`histogram`]: fixed-edge bucket tables and [`find_cut_index`]
//! - [`accumulator`]: the mutex-guarded [`TelemetryAccumulator`]
//! - text rendering of the aggregate via [`TelemetryAccumulator::render`]

pub mod accumulator;
pub mod histogram;
mod render;

pub use accumulator::{
    MetricSnapshot, SuccessMetrics, TelemetryAccumulator, TelemetrySnapshot, remap_code,
};
pub use histogram::{Histogram, MEMORY_EDGES_BYTES, TIME_EDGES_MS, find_cut_index};
