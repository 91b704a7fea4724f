//! Immutable run outcomes and the builder that seals them.
//!
//! Performance samples are recorded into a [`RunOutcomeBuilder`] as soon as
//! each stage finishes. A sample slot can be written once; a second write is
//! rejected rather than overwriting what an earlier stage reported. Sealing
//! consumes the builder, so an outcome is finalised exactly once.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Stage;
use crate::performance::PerformanceSample;
use crate::result_code::ResultCode;

/// Errors raised while recording a run outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutcomeError {
    /// A stage tried to record a second performance sample.
    #[error("{stage} performance sample already recorded")]
    SampleAlreadyRecorded {
        /// The stage whose slot was already filled.
        stage: Stage,
    },

    /// The outcome has already been sealed.
    #[error("run outcome already sealed")]
    AlreadySealed,

    /// The requested lifecycle transition would move the run backwards.
    #[error("invalid run transition from {from} to {to}")]
    InvalidTransition {
        /// Current code.
        from: ResultCode,
        /// Requested code.
        to: ResultCode,
    },
}

/// Final, immutable description of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    code: ResultCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    abort_message: Option<String>,
    fit_sample: PerformanceSample,
    sim_sample: PerformanceSample,
    total_elapsed_ms: u64,
}

impl RunOutcome {
    /// Creates the outcome of a run that never started.
    #[must_use]
    pub const fn not_attempted(code: ResultCode) -> Self {
        Self {
            code,
            abort_message: None,
            fit_sample: PerformanceSample::unknown(),
            sim_sample: PerformanceSample::unknown(),
            total_elapsed_ms: 0,
        }
    }

    /// Returns the result code.
    #[must_use]
    pub const fn code(&self) -> ResultCode {
        self.code
    }

    /// Returns the diagnostic text of the failure, if any.
    #[must_use]
    pub fn abort_message(&self) -> Option<&str> {
        self.abort_message.as_deref()
    }

    /// Returns the fit stage sample.
    #[must_use]
    pub const fn fit_sample(&self) -> PerformanceSample {
        self.fit_sample
    }

    /// Returns the simulation stage sample.
    #[must_use]
    pub const fn sim_sample(&self) -> PerformanceSample {
        self.sim_sample
    }

    /// Returns the total wall time of the run in milliseconds.
    #[must_use]
    pub const fn total_elapsed_ms(&self) -> u64 {
        self.total_elapsed_ms
    }

    /// Returns `true` if the run succeeded.
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        self.code.is_successful()
    }

    /// Returns `true` if the run was attempted.
    #[must_use]
    pub const fn is_attempted(&self) -> bool {
        self.code.is_attempted()
    }
}

/// Accumulates the per-stage parts of a [`RunOutcome`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcomeBuilder {
    fit_sample: Option<PerformanceSample>,
    sim_sample: Option<PerformanceSample>,
}

impl RunOutcomeBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fit_sample: None,
            sim_sample: None,
        }
    }

    /// Records the fit stage sample.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeError::SampleAlreadyRecorded`] if a fit sample was
    /// already recorded.
    pub fn record_fit_sample(&mut self, sample: PerformanceSample) -> Result<(), OutcomeError> {
        record_once(&mut self.fit_sample, sample, Stage::Fit)
    }

    /// Records the simulation stage sample.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeError::SampleAlreadyRecorded`] if a simulation sample
    /// was already recorded.
    pub fn record_sim_sample(&mut self, sample: PerformanceSample) -> Result<(), OutcomeError> {
        record_once(&mut self.sim_sample, sample, Stage::Simulate)
    }

    /// Returns the fit sample recorded so far.
    #[must_use]
    pub const fn fit_sample(&self) -> Option<PerformanceSample> {
        self.fit_sample
    }

    /// Returns the simulation sample recorded so far.
    #[must_use]
    pub const fn sim_sample(&self) -> Option<PerformanceSample> {
        self.sim_sample
    }

    /// Seals the outcome. Unrecorded samples become unknown.
    #[must_use]
    pub fn seal(
        self,
        code: ResultCode,
        abort_message: Option<String>,
        total_elapsed_ms: u64,
    ) -> RunOutcome {
        RunOutcome {
            code,
            abort_message,
            fit_sample: self.fit_sample.unwrap_or_default(),
            sim_sample: self.sim_sample.unwrap_or_default(),
            total_elapsed_ms,
        }
    }
}

fn record_once(
    slot: &mut Option<PerformanceSample>,
    sample: PerformanceSample,
    stage: Stage,
) -> Result<(), OutcomeError> {
    if slot.is_some() {
        return Err(OutcomeError::SampleAlreadyRecorded { stage });
    }
    *slot = Some(sample);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_fills_unknown_samples() {
        let mut builder = RunOutcomeBuilder::new();
        builder
            .record_fit_sample(PerformanceSample::new(30_000, 500_000_000))
            .unwrap();
        let outcome = builder.seal(ResultCode::SimTimeout, Some("late".into()), 70_000);
        assert_eq!(outcome.code(), ResultCode::SimTimeout);
        assert_eq!(outcome.fit_sample().elapsed_ms, Some(30_000));
        assert!(outcome.sim_sample().is_empty());
        assert_eq!(outcome.abort_message(), Some("late"));
        assert_eq!(outcome.total_elapsed_ms(), 70_000);
    }

    #[test]
    fn test_sample_cannot_be_overwritten() {
        let mut builder = RunOutcomeBuilder::new();
        builder
            .record_sim_sample(PerformanceSample::new(1, 1))
            .unwrap();
        let err = builder
            .record_sim_sample(PerformanceSample::new(2, 2))
            .unwrap_err();
        assert_eq!(
            err,
            OutcomeError::SampleAlreadyRecorded {
                stage: Stage::Simulate
            }
        );
        assert_eq!(builder.sim_sample(), Some(PerformanceSample::new(1, 1)));
    }

    #[test]
    fn test_not_attempted_outcome() {
        let outcome = RunOutcome::not_attempted(ResultCode::Disabled);
        assert!(!outcome.is_attempted());
        assert!(!outcome.is_successful());
        assert_eq!(outcome.total_elapsed_ms(), 0);
    }

    #[test]
    fn test_outcome_serializes_code_by_name() {
        let outcome = RunOutcome::not_attempted(ResultCode::NoData);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["code"], "NO_DATA");
        assert!(json.get("abort_message").is_none());
    }
}
