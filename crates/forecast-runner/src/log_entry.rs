//! Log entries derived from run outcomes.
//!
//! Building a [`LogEntry`] is pure: it computes the one-line summary, the
//! [`LogType`], and a staged [`TelemetryUpdate`] without touching global
//! state. The update is applied only by an explicit [`LogEntry::apply`], so a
//! caller can drop an entry (dry run, duplicate evaluation) without polluting
//! the telemetry aggregate.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::outcome::RunOutcome;
use crate::performance::round_ms_to_secs;
use crate::result_code::{LogType, ResultCode, code_to_logtype};
use crate::telemetry::{SuccessMetrics, TelemetryAccumulator};

/// Values staged for merging into a [`TelemetryAccumulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryUpdate {
    /// A successful run with its numeric metrics.
    Success {
        /// Result code.
        code: ResultCode,
        /// Time and memory values.
        metrics: SuccessMetrics,
    },
    /// A failed, skipped or never-started run.
    Failure {
        /// Result code.
        code: ResultCode,
    },
}

impl TelemetryUpdate {
    /// Returns the staged result code.
    #[must_use]
    pub const fn code(&self) -> ResultCode {
        match self {
            Self::Success { code, .. } | Self::Failure { code } => *code,
        }
    }

    /// Merges the staged values into `accumulator`.
    pub fn apply_to(&self, accumulator: &TelemetryAccumulator) {
        match *self {
            Self::Success { code, metrics } => accumulator.accum_success(code, metrics),
            Self::Failure { code } => accumulator.accum_failure(code),
        }
    }

    /// Merges the staged values into `accumulator` and renders the result
    /// while still holding its lock.
    #[must_use]
    pub fn apply_and_render(&self, accumulator: &TelemetryAccumulator) -> String {
        match *self {
            Self::Success { code, metrics } => accumulator.accum_success_and_render(code, metrics),
            Self::Failure { code } => accumulator.accum_failure_and_render(code),
        }
    }
}

/// A structured log record for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Coarse category.
    pub log_type: LogType,
    /// One-line summary.
    pub summary: String,
    /// Failure diagnostic text, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_message: Option<String>,
    /// Values to merge into the telemetry aggregate.
    pub telemetry_update: TelemetryUpdate,
}

impl LogEntry {
    /// Returns the result code of the run.
    #[must_use]
    pub const fn code(&self) -> ResultCode {
        self.telemetry_update.code()
    }

    /// Applies the staged update to `accumulator` and returns a rendering of
    /// the aggregate as of that update.
    pub fn apply(&self, accumulator: &TelemetryAccumulator) -> String {
        self.telemetry_update.apply_and_render(accumulator)
    }

    /// Applies the staged update to the process-wide accumulator.
    pub fn apply_global(&self) -> String {
        self.apply(TelemetryAccumulator::global())
    }

    /// Applies the staged update as configured.
    ///
    /// Returns `None` when telemetry is disabled or rendering is turned off.
    pub fn record(
        &self,
        accumulator: &TelemetryAccumulator,
        config: &TelemetryConfig,
    ) -> Option<String> {
        if !config.enabled {
            return None;
        }
        if config.render_on_apply {
            Some(self.telemetry_update.apply_and_render(accumulator))
        } else {
            self.telemetry_update.apply_to(accumulator);
            None
        }
    }

    /// Emits this entry through `tracing` at a level chosen by its log type.
    pub fn emit(&self) {
        let code = self.code();
        let abort_message = self.abort_message.as_deref().unwrap_or("");
        match self.log_type {
            LogType::Omit => {},
            LogType::Ok => info!(log_type = %self.log_type, %code, summary = %self.summary, "run result"),
            LogType::Fail | LogType::Reject => warn!(
                log_type = %self.log_type,
                %code,
                summary = %self.summary,
                abort_message,
                "run result"
            ),
            LogType::Skip | LogType::Unknown => {
                debug!(log_type = %self.log_type, %code, summary = %self.summary, "run result");
            },
        }
    }
}

/// Builds the one-line summary of a run.
///
/// Runs that never started summarise as their code name alone.
#[must_use]
pub fn build_summary(outcome: &RunOutcome) -> String {
    let code = outcome.code();
    if !code.is_attempted() {
        return code.as_str().to_string();
    }
    let mut summary = String::new();
    if !code.is_successful() {
        summary.push_str(code.as_str());
        summary.push_str(", ");
    }
    summary.push_str(&format!(
        "time = {} s, fit = {}, sim = {}",
        round_ms_to_secs(outcome.total_elapsed_ms()),
        outcome.fit_sample(),
        outcome.sim_sample()
    ));
    summary
}

/// Builds the log entry for a sealed run outcome.
///
/// Successful runs stage every numeric metric; all other runs stage only their
/// code.
#[must_use]
pub fn build_log_entry(outcome: &RunOutcome) -> LogEntry {
    let code = outcome.code();
    let telemetry_update = if code.is_successful() {
        let fit = outcome.fit_sample();
        let sim = outcome.sim_sample();
        TelemetryUpdate::Success {
            code,
            metrics: SuccessMetrics {
                total_time: Some(outcome.total_elapsed_ms()),
                fit_time: fit.elapsed_ms,
                sim_time: sim.elapsed_ms,
                fit_memory: fit.used_memory,
                sim_memory: sim.used_memory,
            },
        }
    } else {
        TelemetryUpdate::Failure { code }
    };
    LogEntry {
        log_type: code_to_logtype(code),
        summary: build_summary(outcome),
        abort_message: outcome.abort_message().map(str::to_string),
        telemetry_update,
    }
}

/// Builds the log entry for an outcome decided before the pipeline started,
/// such as an ineligible input or a disabled configuration.
#[must_use]
pub fn build_pre_run_log_entry(code: ResultCode, summary: impl Into<String>) -> LogEntry {
    LogEntry {
        log_type: code_to_logtype(code),
        summary: summary.into(),
        abort_message: None,
        telemetry_update: TelemetryUpdate::Failure { code },
    }
}
