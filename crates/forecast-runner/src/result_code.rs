//! Result codes and their classification.
//!
//! Every run ends with exactly one [`ResultCode`]. Negative codes mean the
//! pipeline was never attempted, zero is success, and positive codes name a
//! specific failure. [`classify`] maps a [`RunError`] (or its absence) onto the
//! closed code set, and [`code_to_logtype`] collapses codes into the coarse
//! [`LogType`] used to decide how a run is logged.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FailureKind, RunError, Stage};

/// Lowest valid raw code.
pub const MIN_CODE: i32 = -8;

/// Highest valid raw code.
pub const MAX_CODE: i32 = 17;

/// Number of distinct result codes.
#[allow(clippy::cast_sign_loss)]
pub const NUM_CODES: usize = (MAX_CODE - MIN_CODE + 1) as usize;

/// Outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum ResultCode {
    /// The input is not eligible for a forecast.
    Ineligible = -8,
    /// The requested forecast form is not supported.
    UnsupportedForm = -7,
    /// No data was available.
    NoData = -6,
    /// The requested implementation is not supported.
    UnsupportedImpl = -5,
    /// No model parameters were available.
    NoParams = -4,
    /// Runs are disabled by configuration.
    Disabled = -3,
    /// The run was not attempted.
    NotAttempted = -2,
    /// The run is in progress.
    InProgress = -1,
    /// The run completed successfully.
    Success = 0,
    /// Generic abort.
    Abort = 1,
    /// Parameter fit aborted.
    FitAbort = 2,
    /// Parameter fit failed to converge.
    FitConvergence = 3,
    /// A parameter fit worker thread aborted.
    FitThreadAbort = 4,
    /// Parameter fit exceeded the deadline.
    FitTimeout = 5,
    /// Range search aborted.
    RangeAbort = 6,
    /// Range search failed to converge.
    RangeConvergence = 7,
    /// A range search worker thread aborted.
    RangeThreadAbort = 8,
    /// Range search exceeded the deadline.
    RangeTimeout = 9,
    /// Simulation aborted.
    SimAbort = 10,
    /// Simulation could not assemble a forecast.
    SimForecastFailed = 11,
    /// A simulation worker thread aborted.
    SimThreadAbort = 12,
    /// Simulation exceeded the deadline.
    SimTimeout = 13,
    /// The input data was invalid.
    DataInvalid = 14,
    /// An I/O error occurred.
    IoError = 15,
    /// An error outside the known taxonomy occurred.
    UnexpectedError = 16,
    /// The failure could not be identified.
    UnknownFailure = 17,
}

impl ResultCode {
    /// Every code, in ascending numeric order.
    pub const ALL: [Self; NUM_CODES] = [
        Self::Ineligible,
        Self::UnsupportedForm,
        Self::NoData,
        Self::UnsupportedImpl,
        Self::NoParams,
        Self::Disabled,
        Self::NotAttempted,
        Self::InProgress,
        Self::Success,
        Self::Abort,
        Self::FitAbort,
        Self::FitConvergence,
        Self::FitThreadAbort,
        Self::FitTimeout,
        Self::RangeAbort,
        Self::RangeConvergence,
        Self::RangeThreadAbort,
        Self::RangeTimeout,
        Self::SimAbort,
        Self::SimForecastFailed,
        Self::SimThreadAbort,
        Self::SimTimeout,
        Self::DataInvalid,
        Self::IoError,
        Self::UnexpectedError,
        Self::UnknownFailure,
    ];

    /// Converts a raw code, returning `None` outside `MIN_CODE..=MAX_CODE`.
    #[must_use]
    pub fn from_i32(raw: i32) -> Option<Self> {
        if (MIN_CODE..=MAX_CODE).contains(&raw) {
            Some(Self::ALL[slot_of(raw)])
        } else {
            None
        }
    }

    /// Returns the raw numeric code.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns the zero-based position of this code in [`ResultCode::ALL`].
    #[must_use]
    pub const fn slot(self) -> usize {
        slot_of(self as i32)
    }

    /// Returns the symbolic name of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ineligible => "INELIGIBLE",
            Self::UnsupportedForm => "UNSUPPORTED_FORM",
            Self::NoData => "NO_DATA",
            Self::UnsupportedImpl => "UNSUPPORTED_IMPL",
            Self::NoParams => "NO_PARAMS",
            Self::Disabled => "DISABLED",
            Self::NotAttempted => "NOT_ATTEMPTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Success => "SUCCESS",
            Self::Abort => "ABORT",
            Self::FitAbort => "FIT_ABORT",
            Self::FitConvergence => "FIT_CONVERGENCE",
            Self::FitThreadAbort => "FIT_THREAD_ABORT",
            Self::FitTimeout => "FIT_TIMEOUT",
            Self::RangeAbort => "RANGE_ABORT",
            Self::RangeConvergence => "RANGE_CONVERGENCE",
            Self::RangeThreadAbort => "RANGE_THREAD_ABORT",
            Self::RangeTimeout => "RANGE_TIMEOUT",
            Self::SimAbort => "SIM_ABORT",
            Self::SimForecastFailed => "SIM_FORECAST_FAILED",
            Self::SimThreadAbort => "SIM_THREAD_ABORT",
            Self::SimTimeout => "SIM_TIMEOUT",
            Self::DataInvalid => "DATA_INVALID",
            Self::IoError => "IO_ERROR",
            Self::UnexpectedError => "UNEXPECTED_ERROR",
            Self::UnknownFailure => "UNKNOWN_FAILURE",
        }
    }

    /// Returns `true` for [`ResultCode::Success`].
    #[must_use]
    pub const fn is_successful(self) -> bool {
        is_successful(self.as_i32())
    }

    /// Returns `true` if the pipeline was attempted (code is non-negative).
    #[must_use]
    pub const fn is_attempted(self) -> bool {
        is_attempted(self.as_i32())
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[allow(clippy::cast_sign_loss)]
const fn slot_of(raw: i32) -> usize {
    (raw - MIN_CODE) as usize
}

/// Coarse logging category derived from a [`ResultCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    /// Nothing should be logged.
    Omit,
    /// The run succeeded.
    Ok,
    /// The run failed.
    Fail,
    /// The run was skipped before it started.
    Skip,
    /// The outcome is not known.
    Unknown,
    /// The input was rejected.
    Reject,
}

impl LogType {
    /// Returns the symbolic name of this log type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Omit => "OMIT",
            Self::Ok => "OK",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
            Self::Unknown => "UNKNOWN",
            Self::Reject => "REJECT",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies the outcome of a run.
///
/// `None` means the run raised nothing and is a success.
#[must_use]
pub const fn classify(err: Option<&RunError>) -> ResultCode {
    match err {
        None => ResultCode::Success,
        Some(RunError::Stage(stage_err)) => classify_stage(stage_err.stage, stage_err.kind),
        Some(RunError::DataInvalid { .. }) => ResultCode::DataInvalid,
        Some(RunError::Io(_)) => ResultCode::IoError,
        Some(RunError::Outcome(_) | RunError::Unexpected(_)) => ResultCode::UnexpectedError,
    }
}

/// Maps a tagged stage failure to its code.
///
/// Kinds a stage cannot raise fall back to that stage's generic abort.
#[must_use]
pub const fn classify_stage(stage: Stage, kind: FailureKind) -> ResultCode {
    match (stage, kind) {
        (Stage::Simulate, FailureKind::Timeout) => ResultCode::SimTimeout,
        (Stage::Simulate, FailureKind::ThreadAbort) => ResultCode::SimThreadAbort,
        (Stage::Simulate, FailureKind::ForecastFailed) => ResultCode::SimForecastFailed,
        (Stage::Simulate, FailureKind::Abort | FailureKind::Convergence) => ResultCode::SimAbort,

        (Stage::RangeSearch, FailureKind::Timeout) => ResultCode::RangeTimeout,
        (Stage::RangeSearch, FailureKind::ThreadAbort) => ResultCode::RangeThreadAbort,
        (Stage::RangeSearch, FailureKind::Convergence) => ResultCode::RangeConvergence,
        (Stage::RangeSearch, FailureKind::Abort | FailureKind::ForecastFailed) => {
            ResultCode::RangeAbort
        },

        (Stage::Fit, FailureKind::Timeout) => ResultCode::FitTimeout,
        (Stage::Fit, FailureKind::ThreadAbort) => ResultCode::FitThreadAbort,
        (Stage::Fit, FailureKind::Convergence) => ResultCode::FitConvergence,
        (Stage::Fit, FailureKind::Abort | FailureKind::ForecastFailed) => ResultCode::FitAbort,

        (Stage::General, _) => ResultCode::Abort,
    }
}

/// Returns the symbolic name of a code.
#[must_use]
pub const fn code_to_string(code: ResultCode) -> &'static str {
    code.as_str()
}

/// Returns the symbolic name of a raw code, or `INVALID(<code>)` when the code
/// is outside the known range.
#[must_use]
pub fn code_to_string_raw(raw: i32) -> String {
    ResultCode::from_i32(raw).map_or_else(|| format!("INVALID({raw})"), |c| c.as_str().to_string())
}

/// Returns the log type for a code.
#[must_use]
pub const fn code_to_logtype(code: ResultCode) -> LogType {
    match code {
        ResultCode::Success => LogType::Ok,
        ResultCode::Ineligible
        | ResultCode::UnsupportedForm
        | ResultCode::NoData
        | ResultCode::UnsupportedImpl
        | ResultCode::NoParams
        | ResultCode::Disabled => LogType::Skip,
        ResultCode::NotAttempted | ResultCode::InProgress => LogType::Unknown,
        ResultCode::DataInvalid => LogType::Reject,
        ResultCode::Abort
        | ResultCode::FitAbort
        | ResultCode::FitConvergence
        | ResultCode::FitThreadAbort
        | ResultCode::FitTimeout
        | ResultCode::RangeAbort
        | ResultCode::RangeConvergence
        | ResultCode::RangeThreadAbort
        | ResultCode::RangeTimeout
        | ResultCode::SimAbort
        | ResultCode::SimForecastFailed
        | ResultCode::SimThreadAbort
        | ResultCode::SimTimeout
        | ResultCode::IoError
        | ResultCode::UnexpectedError
        | ResultCode::UnknownFailure => LogType::Fail,
    }
}

/// Returns the log type for a raw code. Codes outside the table are
/// [`LogType::Unknown`] when negative and [`LogType::Fail`] otherwise.
#[must_use]
pub fn code_to_logtype_raw(raw: i32) -> LogType {
    match ResultCode::from_i32(raw) {
        Some(code) => code_to_logtype(code),
        None if raw < 0 => LogType::Unknown,
        None => LogType::Fail,
    }
}

/// Returns `true` if `raw` is the success code.
#[must_use]
pub const fn is_successful(raw: i32) -> bool {
    raw == 0
}

/// Returns `true` if `raw` denotes an attempted run.
#[must_use]
pub const fn is_attempted(raw: i32) -> bool {
    raw >= 0
}
