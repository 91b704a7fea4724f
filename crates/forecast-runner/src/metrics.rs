//! Prometheus export of run results.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `forecast_runs_total` | Counter | `result` |
//! | `forecast_stage_duration_seconds` | Histogram | `stage` |
//! | `forecast_stage_memory_bytes` | Gauge | `stage` |
//!
//! Duration buckets use the same edges as the text telemetry, converted to
//! seconds. The memory gauge holds the most recent successful sample.
//!
//! ```rust,ignore
//! let registry = MetricsRegistry::new()?;
//! registry.run_metrics().observe(&entry);
//! let output = registry.encode_text()?;
//! ```

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;

use crate::log_entry::{LogEntry, TelemetryUpdate};
use crate::result_code::ResultCode;
use crate::telemetry::{SuccessMetrics, TIME_EDGES_MS};

/// Stage label for the whole run.
pub const STAGE_TOTAL: &str = "total";
/// Stage label for the fit stage.
pub const STAGE_FIT: &str = "fit";
/// Stage label for the simulation stage.
pub const STAGE_SIM: &str = "sim";

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Failed to register a metric with Prometheus.
    #[error("failed to register metric: {0}")]
    RegistrationFailed(#[from] prometheus::Error),

    /// Failed to encode metrics output.
    #[error("failed to encode metrics: {0}")]
    EncodingFailed(String),
}

/// Result type for metrics operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Duration histogram buckets in seconds.
#[allow(clippy::cast_precision_loss)] // edges are far below 2^52
fn duration_buckets() -> Vec<f64> {
    TIME_EDGES_MS.iter().map(|&ms| ms as f64 / 1000.0).collect()
}

#[allow(clippy::cast_precision_loss)]
fn ms_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Run metrics registered on a Prometheus registry.
///
/// Cheap to clone; clones share the underlying collectors.
#[derive(Clone)]
pub struct RunMetrics {
    runs_total: IntCounterVec,
    stage_duration: HistogramVec,
    stage_memory: IntGaugeVec,
}

impl RunMetrics {
    /// Creates run metrics and registers them with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if any metric fails to register (e.g., duplicate name).
    pub fn new(registry: &Registry) -> MetricsResult<Self> {
        let runs_total = IntCounterVec::new(
            Opts::new("forecast_runs_total", "Total forecast runs by result code"),
            &["result"],
        )?;
        registry.register(Box::new(runs_total.clone()))?;

        let stage_duration = HistogramVec::new(
            HistogramOpts::new(
                "forecast_stage_duration_seconds",
                "Wall time of successful runs by stage",
            )
            .buckets(duration_buckets()),
            &["stage"],
        )?;
        registry.register(Box::new(stage_duration.clone()))?;

        let stage_memory = IntGaugeVec::new(
            Opts::new(
                "forecast_stage_memory_bytes",
                "Memory used by the last successful run by stage",
            ),
            &["stage"],
        )?;
        registry.register(Box::new(stage_memory.clone()))?;

        Ok(Self {
            runs_total,
            stage_duration,
            stage_memory,
        })
    }

    /// Records one run from its log entry.
    pub fn observe(&self, entry: &LogEntry) {
        match entry.telemetry_update {
            TelemetryUpdate::Success { code, metrics } => {
                self.run_finished(code);
                self.record_success(&metrics);
            },
            TelemetryUpdate::Failure { code } => self.run_finished(code),
        }
    }

    /// Counts a run under its result code.
    pub fn run_finished(&self, code: ResultCode) {
        self.runs_total.with_label_values(&[code.as_str()]).inc();
    }

    fn record_success(&self, metrics: &SuccessMetrics) {
        for (stage, elapsed) in [
            (STAGE_TOTAL, metrics.total_time),
            (STAGE_FIT, metrics.fit_time),
            (STAGE_SIM, metrics.sim_time),
        ] {
            if let Some(ms) = elapsed {
                self.stage_duration
                    .with_label_values(&[stage])
                    .observe(ms_to_secs(ms));
            }
        }
        for (stage, memory) in [(STAGE_FIT, metrics.fit_memory), (STAGE_SIM, metrics.sim_memory)] {
            if let Some(bytes) = memory {
                self.stage_memory
                    .with_label_values(&[stage])
                    .set(i64::try_from(bytes).unwrap_or(i64::MAX));
            }
        }
    }

    /// Returns the number of runs recorded under `code`.
    #[must_use]
    pub fn run_count(&self, code: ResultCode) -> u64 {
        self.runs_total.with_label_values(&[code.as_str()]).get()
    }

    /// Returns the number of duration observations for `stage`.
    #[must_use]
    pub fn duration_sample_count(&self, stage: &str) -> u64 {
        self.stage_duration
            .with_label_values(&[stage])
            .get_sample_count()
    }

    /// Returns the last memory sample for `stage`.
    #[must_use]
    pub fn stage_memory(&self, stage: &str) -> i64 {
        self.stage_memory.with_label_values(&[stage]).get()
    }
}

/// A Prometheus registry holding [`RunMetrics`].
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    run_metrics: RunMetrics,
}

impl MetricsRegistry {
    /// Creates a registry with the run metrics registered.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails.
    pub fn new() -> MetricsResult<Self> {
        let registry = Registry::new();
        let run_metrics = RunMetrics::new(&registry)?;
        Ok(Self {
            registry,
            run_metrics,
        })
    }

    /// Returns the run metrics.
    #[must_use]
    pub const fn run_metrics(&self) -> &RunMetrics {
        &self.run_metrics
    }

    /// Encodes all metrics in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode_text(&self) -> MetricsResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingFailed(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingFailed(e.to_string()))
    }

    /// Returns the underlying Prometheus registry.
    #[must_use]
    pub const fn prometheus_registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_entry::build_pre_run_log_entry;
    use crate::result_code::code_to_logtype;

    fn success_entry() -> LogEntry {
        LogEntry {
            log_type: code_to_logtype(ResultCode::Success),
            summary: "ok".to_string(),
            abort_message: None,
            telemetry_update: TelemetryUpdate::Success {
                code: ResultCode::Success,
                metrics: SuccessMetrics {
                    total_time: Some(65_000),
                    fit_time: Some(30_000),
                    sim_time: None,
                    fit_memory: Some(500_000_000),
                    sim_memory: Some(1_200_000_000),
                },
            },
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new().expect("registry creation should succeed");
        assert!(registry.encode_text().is_ok());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = MetricsRegistry::new().unwrap();
        let err = RunMetrics::new(registry.prometheus_registry()).err().unwrap();
        assert!(matches!(err, MetricsError::RegistrationFailed(_)));
    }

    #[test]
    fn test_observe_success() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.run_metrics();
        metrics.observe(&success_entry());

        assert_eq!(metrics.run_count(ResultCode::Success), 1);
        assert_eq!(metrics.duration_sample_count(STAGE_TOTAL), 1);
        assert_eq!(metrics.duration_sample_count(STAGE_FIT), 1);
        assert_eq!(metrics.duration_sample_count(STAGE_SIM), 0);
        assert_eq!(metrics.stage_memory(STAGE_SIM), 1_200_000_000);
    }

    #[test]
    fn test_observe_failure_counts_only() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.run_metrics();
        metrics.observe(&build_pre_run_log_entry(ResultCode::NoData, "no events"));
        metrics.observe(&build_pre_run_log_entry(ResultCode::NoData, "no events"));

        assert_eq!(metrics.run_count(ResultCode::NoData), 2);
        assert_eq!(metrics.run_count(ResultCode::Success), 0);
        assert_eq!(metrics.duration_sample_count(STAGE_TOTAL), 0);
    }

    #[test]
    fn test_encode_contains_families() {
        let registry = MetricsRegistry::new().unwrap();
        registry.run_metrics().observe(&success_entry());
        let output = registry.encode_text().unwrap();
        assert!(output.contains("forecast_runs_total{result=\"SUCCESS\"} 1"));
        assert!(output.contains("forecast_stage_duration_seconds_bucket"));
        assert!(output.contains("le=\"3600\""));
        assert!(output.contains("forecast_stage_memory_bytes"));
    }
}
