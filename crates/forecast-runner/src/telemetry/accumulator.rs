//! Process-wide telemetry accumulator.
//!
//! [`TelemetryAccumulator`] aggregates run outcomes: success and failure
//! counts, a count per [`ResultCode`], and histograms plus running maxima for
//! total/fit/sim time and fit/sim memory.
//!
//! # Thread Safety
//!
//! All state sits behind one mutex. Every call is atomic with respect to every
//! other call, and the aggregate is a commutative sum, so the final state does
//! not depend on the order in which concurrent runs report.
//!
//! Tests construct isolated instances with [`TelemetryAccumulator::new`];
//! production code shares [`TelemetryAccumulator::global`].

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::histogram::{Histogram, MEMORY_EDGES_BYTES, TIME_EDGES_MS};
use super::render;
use crate::performance::derive_total_time;
use crate::result_code::{NUM_CODES, ResultCode};

/// One numeric metric: a histogram plus its running maximum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MetricSeries {
    histogram: Histogram,
    max: Option<u64>,
}

impl MetricSeries {
    fn new(edges: &'static [u64]) -> Self {
        Self {
            histogram: Histogram::new(edges),
            max: None,
        }
    }

    fn record(&mut self, value: Option<u64>) {
        if let Some(value) = value {
            self.histogram.record(value);
            self.max = Some(self.max.map_or(value, |m| m.max(value)));
        }
    }

    fn clear(&mut self) {
        self.histogram.clear();
        self.max = None;
    }

    /// Returns the histogram.
    #[must_use]
    pub const fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Returns the largest value recorded, if any.
    #[must_use]
    pub const fn max(&self) -> Option<u64> {
        self.max
    }

    fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            edges: self.histogram.edges().to_vec(),
            counts: self.histogram.counts().to_vec(),
            max: self.max,
        }
    }
}

/// The aggregate guarded by a [`TelemetryAccumulator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TelemetryState {
    pub(crate) success_count: u64,
    pub(crate) failure_count: u64,
    pub(crate) per_code_count: [u64; NUM_CODES],
    pub(crate) total_time: MetricSeries,
    pub(crate) fit_time: MetricSeries,
    pub(crate) sim_time: MetricSeries,
    pub(crate) fit_memory: MetricSeries,
    pub(crate) sim_memory: MetricSeries,
}

impl TelemetryState {
    fn new() -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            per_code_count: [0; NUM_CODES],
            total_time: MetricSeries::new(TIME_EDGES_MS),
            fit_time: MetricSeries::new(TIME_EDGES_MS),
            sim_time: MetricSeries::new(TIME_EDGES_MS),
            fit_memory: MetricSeries::new(MEMORY_EDGES_BYTES),
            sim_memory: MetricSeries::new(MEMORY_EDGES_BYTES),
        }
    }

    fn count_code(&mut self, code: ResultCode) {
        let slot = &mut self.per_code_count[code.slot()];
        *slot = slot.saturating_add(1);
    }

    fn record_success(&mut self, code: ResultCode, metrics: SuccessMetrics) {
        let total_time = derive_total_time(metrics.total_time, metrics.fit_time, metrics.sim_time);
        self.success_count = self.success_count.saturating_add(1);
        self.count_code(code);
        self.total_time.record(total_time);
        self.fit_time.record(metrics.fit_time);
        self.sim_time.record(metrics.sim_time);
        self.fit_memory.record(metrics.fit_memory);
        self.sim_memory.record(metrics.sim_memory);
    }

    fn record_failure(&mut self, code: ResultCode) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.count_code(code);
    }

    fn clear(&mut self) {
        self.success_count = 0;
        self.failure_count = 0;
        self.per_code_count = [0; NUM_CODES];
        self.total_time.clear();
        self.fit_time.clear();
        self.sim_time.clear();
        self.fit_memory.clear();
        self.sim_memory.clear();
    }

    fn snapshot(&self) -> TelemetrySnapshot {
        let per_code = ResultCode::ALL
            .iter()
            .filter(|code| **code == ResultCode::Success || self.per_code_count[code.slot()] != 0)
            .map(|code| (code.as_str().to_string(), self.per_code_count[code.slot()]))
            .collect();
        TelemetrySnapshot {
            success_count: self.success_count,
            failure_count: self.failure_count,
            per_code,
            total_time_ms: self.total_time.snapshot(),
            fit_time_ms: self.fit_time.snapshot(),
            sim_time_ms: self.sim_time.snapshot(),
            fit_memory_bytes: self.fit_memory.snapshot(),
            sim_memory_bytes: self.sim_memory.snapshot(),
        }
    }
}

/// Numeric values of one successful run, each possibly unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMetrics {
    /// Total wall time in milliseconds.
    pub total_time: Option<u64>,
    /// Fit stage time in milliseconds.
    pub fit_time: Option<u64>,
    /// Simulation stage time in milliseconds.
    pub sim_time: Option<u64>,
    /// Memory after the fit stage in bytes.
    pub fit_memory: Option<u64>,
    /// Memory after the simulation stage in bytes.
    pub sim_memory: Option<u64>,
}

/// Mutex-guarded telemetry aggregate.
#[derive(Debug)]
pub struct TelemetryAccumulator {
    state: Mutex<TelemetryState>,
}

impl Default for TelemetryAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryAccumulator {
    /// Creates an isolated, empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TelemetryState::new()),
        }
    }

    /// Returns the process-wide accumulator, creating it on first access.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<TelemetryAccumulator> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    // Updates never panic part-way, so a poisoned guard still holds a
    // consistent aggregate.
    fn lock(&self) -> MutexGuard<'_, TelemetryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a successful run.
    ///
    /// An unknown `total_time` is derived from the fit and sim times (see
    /// [`derive_total_time`]).
    pub fn accum_success(&self, code: ResultCode, metrics: SuccessMetrics) {
        self.lock().record_success(code, metrics);
    }

    /// Records a successful run and renders the aggregate under the same
    /// lock, so the text includes exactly this update and nothing later.
    #[must_use]
    pub fn accum_success_and_render(&self, code: ResultCode, metrics: SuccessMetrics) -> String {
        let mut state = self.lock();
        state.record_success(code, metrics);
        render::render_state(&state)
    }

    /// Records a successful run reported with a raw code.
    pub fn accum_success_raw(&self, raw_code: i32, metrics: SuccessMetrics) {
        self.accum_success(remap_code(raw_code), metrics);
    }

    /// Records a failed or skipped run.
    pub fn accum_failure(&self, code: ResultCode) {
        self.lock().record_failure(code);
    }

    /// Records a failed or skipped run and renders the aggregate under the
    /// same lock.
    #[must_use]
    pub fn accum_failure_and_render(&self, code: ResultCode) -> String {
        let mut state = self.lock();
        state.record_failure(code);
        render::render_state(&state)
    }

    /// Records a failed or skipped run reported with a raw code.
    pub fn accum_failure_raw(&self, raw_code: i32) {
        self.accum_failure(remap_code(raw_code));
    }

    /// Zeroes all counters, histograms and maxima.
    pub fn clear(&self) {
        self.lock().clear();
        debug!("telemetry accumulator cleared");
    }

    /// Renders the aggregate as an operator-facing text report.
    #[must_use]
    pub fn render(&self) -> String {
        render::render_state(&self.lock())
    }

    /// Returns a serializable copy of the aggregate.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.lock().snapshot()
    }
}

/// Maps a raw code onto the code table; unknown codes become
/// [`ResultCode::UnknownFailure`].
#[must_use]
pub fn remap_code(raw_code: i32) -> ResultCode {
    ResultCode::from_i32(raw_code).unwrap_or(ResultCode::UnknownFailure)
}

/// Serializable copy of one metric series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Bucket edges.
    pub edges: Vec<u64>,
    /// Bucket counts, overflow last.
    pub counts: Vec<u64>,
    /// Largest value recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

/// Serializable copy of the whole aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySnapshot {
    /// Number of successful runs.
    pub success_count: u64,
    /// Number of failed or skipped runs.
    pub failure_count: u64,
    /// Non-zero counts per symbolic code (`SUCCESS` always present).
    pub per_code: BTreeMap<String, u64>,
    /// Total time distribution.
    pub total_time_ms: MetricSnapshot,
    /// Fit time distribution.
    pub fit_time_ms: MetricSnapshot,
    /// Simulation time distribution.
    pub sim_time_ms: MetricSnapshot,
    /// Fit memory distribution.
    pub fit_memory_bytes: MetricSnapshot,
    /// Simulation memory distribution.
    pub sim_memory_bytes: MetricSnapshot,
}
