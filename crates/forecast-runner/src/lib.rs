//! # forecast-runner
//!
//! Orchestration, outcome classification and cross-run telemetry for bounded
//! forecast runs.
//!
//! A run goes through three opaque computational stages (history build,
//! parameter fit, ensemble simulation) supplied through the [`RunStages`]
//! trait. This crate:
//!
//! - Drives the stages and records their performance via [`Orchestrator`]
//! - Classifies every way a run can end into a [`ResultCode`]
//! - Turns a sealed [`RunOutcome`] into a [`LogEntry`] with a one-line summary
//! - Aggregates counts, histograms and maxima across runs in a
//!   [`TelemetryAccumulator`] that renders as fixed-width text tables
//!
//! ## Example
//!
//! ```rust
//! use forecast_runner::{
//!     ResultCode, TelemetryAccumulator, build_pre_run_log_entry,
//! };
//!
//! let telemetry = TelemetryAccumulator::new();
//! let entry = build_pre_run_log_entry(ResultCode::NoData, "no events in region");
//! let text = entry.apply(&telemetry);
//! assert!(text.starts_with("Successes: 0\nFailures: 1\n"));
//! ```
//!
//! ## Error Handling
//!
//! Stages fail with [`RunError`], usually wrapping a [`StageError`] tagged
//! with the [`Stage`] and [`FailureKind`]. The orchestrator never catches:
//! the caller passes the error back to [`Orchestrator::report_exception`],
//! which classifies it and keeps the diagnostic text.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod log_entry;
pub mod metrics;
pub mod orchestrator;
pub mod outcome;
pub mod performance;
pub mod result_code;
pub mod telemetry;
pub mod timer;

// Re-export main types at crate root for convenience
pub use config::{ConfigError, RunConfig, RunnerConfig, TelemetryConfig};
pub use error::{FailureKind, RunError, Stage, StageError};
pub use log_entry::{
    LogEntry, TelemetryUpdate, build_log_entry, build_pre_run_log_entry, build_summary,
};
pub use metrics::{MetricsError, MetricsRegistry, RunMetrics};
pub use orchestrator::{Orchestrator, RunStages, StageOutput};
pub use outcome::{OutcomeError, RunOutcome, RunOutcomeBuilder};
pub use performance::{PerformanceSample, derive_total_time};
pub use result_code::{
    LogType, ResultCode, classify, code_to_logtype, code_to_logtype_raw, code_to_string,
    code_to_string_raw,
};
pub use telemetry::{SuccessMetrics, TelemetryAccumulator, TelemetrySnapshot};
pub use timer::{DeadlineTimer, ExecutionTimer};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{RunnerConfig, TelemetryConfig};
    pub use crate::error::{FailureKind, RunError, Stage, StageError};
    pub use crate::log_entry::{LogEntry, build_log_entry, build_pre_run_log_entry};
    pub use crate::orchestrator::{Orchestrator, RunStages, StageOutput};
    pub use crate::outcome::RunOutcome;
    pub use crate::performance::PerformanceSample;
    pub use crate::result_code::{LogType, ResultCode};
    pub use crate::telemetry::{SuccessMetrics, TelemetryAccumulator};
    pub use crate::timer::{DeadlineTimer, ExecutionTimer};
}
