//! Error taxonomy for forecast runs.
//!
//! Stage collaborators report failures as a tagged [`StageError`] carrying the
//! pipeline [`Stage`] and the [`FailureKind`]. Everything a run can fail with
//! is wrapped in [`RunError`], which is the single type the orchestrator
//! propagates and the classifier consumes.
//!
//! The tagged representation means a timeout is never "also" a generic abort:
//! classification is a total match over `(stage, kind)` and cannot depend on
//! the order in which checks happen to be written.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outcome::OutcomeError;

/// Boxed underlying cause attached to a [`StageError`].
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Pipeline stage that raised a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Failure not attributable to a specific computational stage, including
    /// history construction and result assembly.
    General,
    /// Parameter fitting over the search grid.
    Fit,
    /// Range search performed while fitting.
    RangeSearch,
    /// Stochastic ensemble simulation.
    Simulate,
}

impl Stage {
    /// Returns the stable string form of this stage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Fit => "fit",
            Self::RangeSearch => "range_search",
            Self::Simulate => "simulate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of failure within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Generic abort of the stage.
    Abort,
    /// An iterative solver failed to converge.
    Convergence,
    /// A worker thread used by the stage aborted.
    ThreadAbort,
    /// The stage exceeded the execution timer's deadline.
    Timeout,
    /// The simulation could not assemble a forecast from its ensemble.
    ForecastFailed,
}

impl FailureKind {
    /// Returns the stable string form of this failure kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Convergence => "convergence failure",
            Self::ThreadAbort => "worker thread abort",
            Self::Timeout => "timeout",
            Self::ForecastFailed => "forecast assembly failure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised by one of the computational stages.
#[derive(Debug, Error)]
#[error("{stage} {kind}: {message}")]
pub struct StageError {
    /// The stage that failed.
    pub stage: Stage,
    /// How it failed.
    pub kind: FailureKind,
    /// Operator-facing description.
    pub message: String,
    /// Underlying cause, if any.
    #[source]
    pub cause: Option<BoxedCause>,
}

impl StageError {
    /// Creates a stage error with no underlying cause.
    #[must_use]
    pub fn new(stage: Stage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a generic abort for `stage`.
    #[must_use]
    pub fn abort(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::Abort, message)
    }

    /// Creates a convergence failure for `stage`.
    #[must_use]
    pub fn convergence(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::Convergence, message)
    }

    /// Creates a worker-thread abort for `stage`.
    #[must_use]
    pub fn thread_abort(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::ThreadAbort, message)
    }

    /// Creates a deadline timeout for `stage`.
    #[must_use]
    pub fn timeout(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::Timeout, message)
    }

    /// Creates a simulation forecast-assembly failure.
    #[must_use]
    pub fn forecast_failed(message: impl Into<String>) -> Self {
        Self::new(Stage::Simulate, FailureKind::ForecastFailed, message)
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<BoxedCause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Returns `true` if this failure was a deadline timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, FailureKind::Timeout)
    }
}

/// Any failure that can end a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// A computational stage failed.
    #[error(transparent)]
    Stage(#[from] StageError),

    /// The input data was rejected as invalid.
    #[error("invalid data: {reason}")]
    DataInvalid {
        /// Why the data was rejected.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("i/o failure")]
    Io(#[from] std::io::Error),

    /// The run outcome could not be recorded.
    #[error("run outcome rejected")]
    Outcome(#[from] OutcomeError),

    /// A failure outside the known taxonomy.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl RunError {
    /// Creates a new invalid data error.
    #[must_use]
    pub fn data_invalid(reason: impl Into<String>) -> Self {
        Self::DataInvalid {
            reason: reason.into(),
        }
    }

    /// Creates a new unexpected error.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Returns the stage error, if this failure came from a stage.
    #[must_use]
    pub const fn as_stage(&self) -> Option<&StageError> {
        match self {
            Self::Stage(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the full diagnostic text of this error and its causes.
    #[must_use]
    pub fn diagnostic_text(&self) -> String {
        diagnostic_text(self)
    }
}

/// Renders an error followed by every error in its `source()` chain, one
/// `caused by:` line per cause.
#[must_use]
pub fn diagnostic_text(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str("\ncaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
