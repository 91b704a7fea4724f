//! Run lifecycle orchestration.
//!
//! An [`Orchestrator`] drives one run through the pipeline stages supplied by
//! a [`RunStages`] implementation:
//!
//! 1. **History**: [`RunStages::build_history`]
//! 2. **Fit**: [`RunStages::fit_parameters`], sample recorded on return
//! 3. **Simulate**: [`RunStages::simulate`], sample recorded on return
//! 4. **Assemble**: [`RunStages::assemble_results`]
//!
//! # Lifecycle
//!
//! ```text
//! NOT_ATTEMPTED --setup--> IN_PROGRESS --run ok--> SUCCESS
//!                              |
//!                              +--report_exception--> <failure code>
//! ```
//!
//! [`Orchestrator::run`] never catches: a stage error propagates to the
//! caller unchanged, and the caller records it with
//! [`Orchestrator::report_exception`]. Because each sample is recorded as its
//! stage returns, a simulation failure still leaves the fit sample in the
//! sealed [`RunOutcome`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use forecast_runner::{
//!     DeadlineTimer, ExecutionTimer, Orchestrator, PerformanceSample, ResultCode, RunError,
//!     RunStages, StageOutput,
//! };
//!
//! struct Noop;
//!
//! impl RunStages for Noop {
//!     type VoxelSet = ();
//!
//!     fn build_history(&mut self, _timer: &dyn ExecutionTimer) -> Result<(), RunError> {
//!         Ok(())
//!     }
//!
//!     fn fit_parameters(
//!         &mut self,
//!         _timer: &dyn ExecutionTimer,
//!     ) -> Result<StageOutput<()>, RunError> {
//!         Ok(StageOutput::new((), PerformanceSample::new(10, 1_000)))
//!     }
//!
//!     fn simulate(
//!         &mut self,
//!         _voxels: &(),
//!         _timer: &dyn ExecutionTimer,
//!     ) -> Result<PerformanceSample, RunError> {
//!         Ok(PerformanceSample::new(20, 2_000))
//!     }
//!
//!     fn assemble_results(&mut self, _timer: &dyn ExecutionTimer) -> Result<(), RunError> {
//!         Ok(())
//!     }
//! }
//!
//! let mut orchestrator = Orchestrator::new(Noop);
//! let outcome = orchestrator.execute(Arc::new(DeadlineTimer::started(None)));
//! assert_eq!(outcome.code(), ResultCode::Success);
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::RunError;
use crate::outcome::{OutcomeError, RunOutcome, RunOutcomeBuilder};
use crate::performance::PerformanceSample;
use crate::result_code::{ResultCode, classify};
use crate::timer::ExecutionTimer;

/// Value produced by a stage together with its performance sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput<T> {
    /// The stage's result.
    pub value: T,
    /// Elapsed time and memory of the stage.
    pub sample: PerformanceSample,
}

impl<T> StageOutput<T> {
    /// Pairs a value with its sample.
    pub const fn new(value: T, sample: PerformanceSample) -> Self {
        Self { value, sample }
    }
}

/// The computational stages of a run.
///
/// Implementations respect the timer's deadline (see
/// [`ExecutionTimer::check_deadline`]) and report failures as [`RunError`]s,
/// normally built from a tagged [`crate::StageError`].
pub trait RunStages {
    /// Fitted parameter set handed from the fit stage to the simulation.
    type VoxelSet;

    /// Builds the discretized history from the input events.
    ///
    /// # Errors
    ///
    /// Any failure ends the run.
    fn build_history(&mut self, timer: &dyn ExecutionTimer) -> Result<(), RunError>;

    /// Fits model parameters over the search grid.
    ///
    /// # Errors
    ///
    /// Any failure ends the run.
    fn fit_parameters(
        &mut self,
        timer: &dyn ExecutionTimer,
    ) -> Result<StageOutput<Self::VoxelSet>, RunError>;

    /// Runs the ensemble simulation over the fitted parameters.
    ///
    /// # Errors
    ///
    /// Any failure ends the run.
    fn simulate(
        &mut self,
        voxels: &Self::VoxelSet,
        timer: &dyn ExecutionTimer,
    ) -> Result<PerformanceSample, RunError>;

    /// Assembles the final results.
    ///
    /// # Errors
    ///
    /// Any failure ends the run.
    fn assemble_results(&mut self, timer: &dyn ExecutionTimer) -> Result<(), RunError>;
}

/// Drives a single run and owns its outcome.
#[derive(Debug)]
pub struct Orchestrator<S> {
    stages: S,
    timer: Option<Arc<dyn ExecutionTimer>>,
    code: ResultCode,
    abort_message: Option<String>,
    builder: Option<RunOutcomeBuilder>,
    outcome: Option<RunOutcome>,
}

impl<S: RunStages> Orchestrator<S> {
    /// Creates an orchestrator that has not started.
    pub const fn new(stages: S) -> Self {
        Self {
            stages,
            timer: None,
            code: ResultCode::NotAttempted,
            abort_message: None,
            builder: Some(RunOutcomeBuilder::new()),
            outcome: None,
        }
    }

    /// Binds the caller's already-started timer and marks the run in
    /// progress.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeError::InvalidTransition`] if the run has already
    /// started.
    pub fn setup(&mut self, timer: Arc<dyn ExecutionTimer>) -> Result<(), RunError> {
        if self.code != ResultCode::NotAttempted || self.outcome.is_some() {
            return Err(OutcomeError::InvalidTransition {
                from: self.code,
                to: ResultCode::InProgress,
            }
            .into());
        }
        self.timer = Some(timer);
        self.code = ResultCode::InProgress;
        self.abort_message = None;
        self.builder = Some(RunOutcomeBuilder::new());
        debug!("run set up");
        Ok(())
    }

    /// Runs every stage in order.
    ///
    /// # Errors
    ///
    /// Returns the first stage error unchanged. Also fails, before any stage
    /// runs, if called without [`Orchestrator::setup`], after the run has
    /// ended, or once the outcome is sealed.
    pub fn run(&mut self) -> Result<(), RunError> {
        let Some(timer) = self.timer.clone() else {
            return Err(RunError::unexpected("run started before setup"));
        };
        if self.outcome.is_some() {
            return Err(OutcomeError::AlreadySealed.into());
        }
        if self.code != ResultCode::InProgress {
            return Err(OutcomeError::InvalidTransition {
                from: self.code,
                to: ResultCode::Success,
            }
            .into());
        }
        let timer = timer.as_ref();

        debug!(elapsed_ms = timer.split_runtime_ms(), "building history");
        self.stages.build_history(timer)?;

        debug!(elapsed_ms = timer.split_runtime_ms(), "fitting parameters");
        let fit = self.stages.fit_parameters(timer)?;
        self.builder_mut()?.record_fit_sample(fit.sample)?;

        debug!(elapsed_ms = timer.split_runtime_ms(), "running simulation");
        let sim_sample = self.stages.simulate(&fit.value, timer)?;
        self.builder_mut()?.record_sim_sample(sim_sample)?;

        debug!(elapsed_ms = timer.split_runtime_ms(), "assembling results");
        self.stages.assemble_results(timer)?;

        self.code = ResultCode::Success;
        info!(
            elapsed_ms = timer.split_runtime_ms(),
            fit = %fit.sample,
            sim = %sim_sample,
            "run completed"
        );
        Ok(())
    }

    /// Records the error that ended the run.
    ///
    /// May be called before [`Orchestrator::setup`]. Ignored once the run has
    /// already reached a final code.
    pub fn report_exception(&mut self, err: &RunError) {
        if self.is_finished() {
            warn!(
                code = %self.code,
                error = %err,
                "ignoring error reported after run finished"
            );
            return;
        }
        self.code = classify(Some(err));
        let message = err.diagnostic_text();
        warn!(code = %self.code, error = %message, "run failed");
        self.abort_message = Some(message);
    }

    /// Runs `setup` and `run`, reporting any error, then seals the outcome.
    pub fn execute(&mut self, timer: Arc<dyn ExecutionTimer>) -> &RunOutcome {
        if let Err(err) = self.setup(timer).and_then(|()| self.run()) {
            self.report_exception(&err);
        }
        self.finish()
    }

    /// Seals the outcome on first call and returns it.
    pub fn finish(&mut self) -> &RunOutcome {
        let Self {
            timer,
            code,
            abort_message,
            builder,
            outcome,
            ..
        } = self;
        outcome.get_or_insert_with(|| {
            let total_elapsed_ms = timer.as_ref().map_or(0, |t| t.split_runtime_ms());
            builder
                .take()
                .unwrap_or_default()
                .seal(*code, abort_message.clone(), total_elapsed_ms)
        })
    }

    /// Returns the sealed outcome, if [`Orchestrator::finish`] has run.
    pub const fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    /// Returns the current result code.
    pub const fn code(&self) -> ResultCode {
        self.code
    }

    /// Returns `true` if the run succeeded.
    pub const fn is_successful(&self) -> bool {
        self.code.is_successful()
    }

    /// Returns `true` if the run was attempted.
    pub const fn is_attempted(&self) -> bool {
        self.code.is_attempted()
    }

    /// Returns the symbolic name of the current code.
    pub const fn code_as_string(&self) -> &'static str {
        self.code.as_str()
    }

    /// Returns `true` if a failure message was recorded.
    pub const fn has_abort_message(&self) -> bool {
        self.abort_message.is_some()
    }

    /// Returns the recorded failure message.
    pub fn abort_message(&self) -> Option<&str> {
        self.abort_message.as_deref()
    }

    /// Returns the stages.
    pub const fn stages(&self) -> &S {
        &self.stages
    }

    /// Consumes the orchestrator and returns the stages.
    pub fn into_stages(self) -> S {
        self.stages
    }

    const fn is_finished(&self) -> bool {
        !matches!(self.code, ResultCode::NotAttempted | ResultCode::InProgress)
            || self.outcome.is_some()
    }

    fn builder_mut(&mut self) -> Result<&mut RunOutcomeBuilder, OutcomeError> {
        self.builder.as_mut().ok_or(OutcomeError::AlreadySealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Stage, StageError};
    use crate::timer::DeadlineTimer;

    /// Stages that fail at a configurable point.
    #[derive(Debug, Default)]
    struct ScriptedStages {
        fail_history: bool,
        fail_sim: Option<StageError>,
        calls: Vec<&'static str>,
    }

    impl RunStages for ScriptedStages {
        type VoxelSet = Vec<f64>;

        fn build_history(&mut self, _timer: &dyn ExecutionTimer) -> Result<(), RunError> {
            self.calls.push("history");
            if self.fail_history {
                return Err(RunError::data_invalid("empty catalog"));
            }
            Ok(())
        }

        fn fit_parameters(
            &mut self,
            _timer: &dyn ExecutionTimer,
        ) -> Result<StageOutput<Vec<f64>>, RunError> {
            self.calls.push("fit");
            Ok(StageOutput::new(
                vec![0.1, 0.2],
                PerformanceSample::new(30_000, 500_000_000),
            ))
        }

        fn simulate(
            &mut self,
            voxels: &Vec<f64>,
            _timer: &dyn ExecutionTimer,
        ) -> Result<PerformanceSample, RunError> {
            self.calls.push("simulate");
            assert_eq!(voxels.len(), 2);
            if let Some(err) = self.fail_sim.take() {
                return Err(err.into());
            }
            Ok(PerformanceSample::new(35_000, 1_200_000_000))
        }

        fn assemble_results(&mut self, _timer: &dyn ExecutionTimer) -> Result<(), RunError> {
            self.calls.push("assemble");
            Ok(())
        }
    }

    fn timer() -> Arc<dyn ExecutionTimer> {
        Arc::new(DeadlineTimer::started(None))
    }

    #[test]
    fn test_initial_state() {
        let orch = Orchestrator::new(ScriptedStages::default());
        assert_eq!(orch.code(), ResultCode::NotAttempted);
        assert!(!orch.is_attempted());
        assert!(!orch.has_abort_message());
    }

    #[test]
    fn test_successful_run_calls_stages_in_order() {
        let mut orch = Orchestrator::new(ScriptedStages::default());
        orch.setup(timer()).unwrap();
        assert_eq!(orch.code(), ResultCode::InProgress);
        assert!(orch.is_attempted());
        orch.run().unwrap();
        assert!(orch.is_successful());
        assert_eq!(
            orch.stages().calls,
            vec!["history", "fit", "simulate", "assemble"]
        );
        let outcome = orch.finish().clone();
        assert_eq!(outcome.fit_sample(), PerformanceSample::new(30_000, 500_000_000));
        assert_eq!(outcome.sim_sample(), PerformanceSample::new(35_000, 1_200_000_000));
    }

    #[test]
    fn test_run_without_setup_fails() {
        let mut orch = Orchestrator::new(ScriptedStages::default());
        let err = orch.run().unwrap_err();
        assert!(matches!(err, RunError::Unexpected(_)));
        assert!(orch.stages().calls.is_empty());
    }

    #[test]
    fn test_stage_error_propagates_unchanged() {
        let mut orch = Orchestrator::new(ScriptedStages {
            fail_sim: Some(StageError::thread_abort(Stage::Simulate, "worker panicked")),
            ..ScriptedStages::default()
        });
        orch.setup(timer()).unwrap();
        let err = orch.run().unwrap_err();
        let stage_err = err.as_stage().unwrap();
        assert_eq!(stage_err.message, "worker panicked");
        // run() does not classify on its own.
        assert_eq!(orch.code(), ResultCode::InProgress);

        orch.report_exception(&err);
        assert_eq!(orch.code(), ResultCode::SimThreadAbort);
        assert!(orch.abort_message().unwrap().contains("worker panicked"));
        assert!(!orch.stages().calls.contains(&"assemble"));
    }

    #[test]
    fn test_report_exception_before_setup() {
        let mut orch = Orchestrator::new(ScriptedStages::default());
        orch.report_exception(&RunError::data_invalid("bad region"));
        assert_eq!(orch.code_as_string(), "DATA_INVALID");
        assert!(orch.has_abort_message());
        assert!(orch.setup(timer()).is_err());
    }

    #[test]
    fn test_report_after_success_is_ignored() {
        let mut orch = Orchestrator::new(ScriptedStages::default());
        orch.setup(timer()).unwrap();
        orch.run().unwrap();
        orch.report_exception(&RunError::unexpected("late"));
        assert!(orch.is_successful());
        assert!(!orch.has_abort_message());
    }

    #[test]
    fn test_finish_seals_once() {
        let mut orch = Orchestrator::new(ScriptedStages {
            fail_history: true,
            ..ScriptedStages::default()
        });
        let first = orch.execute(timer()).clone();
        assert_eq!(first.code(), ResultCode::DataInvalid);
        assert!(first.fit_sample().is_empty());
        let second = orch.finish().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_run_after_finish_calls_no_stage() {
        let mut orch = Orchestrator::new(ScriptedStages::default());
        orch.setup(timer()).unwrap();
        let sealed = orch.finish().clone();
        assert_eq!(sealed.code(), ResultCode::InProgress);

        let err = orch.run().unwrap_err();
        assert!(matches!(
            err,
            RunError::Outcome(OutcomeError::AlreadySealed)
        ));
        assert!(orch.stages().calls.is_empty());
        assert_eq!(orch.finish(), &sealed);
    }

    #[test]
    fn test_setup_twice_is_rejected() {
        let mut orch = Orchestrator::new(ScriptedStages::default());
        orch.setup(timer()).unwrap();
        let err = orch.setup(timer()).unwrap_err();
        assert!(matches!(
            err,
            RunError::Outcome(OutcomeError::InvalidTransition { .. })
        ));
    }
}
