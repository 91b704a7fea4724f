//! Per-stage performance samples.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw sentinel meaning "not measured" in external positional records.
pub const UNKNOWN_SENTINEL: i64 = -1;

/// Bytes per reported megabyte (decimal).
pub const BYTES_PER_MB: u64 = 1_000_000;

/// Elapsed time and memory used by one completed pipeline stage.
///
/// Either field may be unknown (`None`), which is distinct from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceSample {
    /// Wall time spent in the stage, in milliseconds.
    pub elapsed_ms: Option<u64>,
    /// Memory in use when the stage finished, in bytes.
    pub used_memory: Option<u64>,
}

impl PerformanceSample {
    /// Creates a sample with both values known.
    #[must_use]
    pub const fn new(elapsed_ms: u64, used_memory: u64) -> Self {
        Self {
            elapsed_ms: Some(elapsed_ms),
            used_memory: Some(used_memory),
        }
    }

    /// Creates a sample with both values unknown.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            elapsed_ms: None,
            used_memory: None,
        }
    }

    /// Returns `true` if neither value is known.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.elapsed_ms.is_none() && self.used_memory.is_none()
    }

    /// Returns the sample as `(elapsed_ms, used_memory)` with
    /// [`UNKNOWN_SENTINEL`] standing in for unknown values.
    #[must_use]
    pub fn to_raw(&self) -> (i64, i64) {
        (to_raw_value(self.elapsed_ms), to_raw_value(self.used_memory))
    }

    /// Builds a sample from raw values, treating any negative value as
    /// unknown.
    #[must_use]
    pub fn from_raw(elapsed_ms: i64, used_memory: i64) -> Self {
        Self {
            elapsed_ms: u64::try_from(elapsed_ms).ok(),
            used_memory: u64::try_from(used_memory).ok(),
        }
    }
}

impl fmt::Display for PerformanceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.elapsed_ms {
            Some(ms) => write!(f, "({} s, ", round_ms_to_secs(ms))?,
            None => f.write_str("(- s, ")?,
        }
        match self.used_memory {
            Some(bytes) => write!(f, "{} MB)", round_bytes_to_mb(bytes)),
            None => f.write_str("- MB)"),
        }
    }
}

fn to_raw_value(value: Option<u64>) -> i64 {
    value.map_or(UNKNOWN_SENTINEL, |v| i64::try_from(v).unwrap_or(i64::MAX))
}

/// Resolves the total time of a run.
///
/// A known `total` is returned unchanged. Otherwise the total is `fit + sim`,
/// with an unknown addend counted as zero, unless both are unknown.
#[must_use]
pub fn derive_total_time(total: Option<u64>, fit: Option<u64>, sim: Option<u64>) -> Option<u64> {
    if total.is_some() {
        return total;
    }
    match (fit, sim) {
        (None, None) => None,
        (fit, sim) => Some(fit.unwrap_or(0).saturating_add(sim.unwrap_or(0))),
    }
}

/// Rounds milliseconds to the nearest whole second.
#[must_use]
pub const fn round_ms_to_secs(ms: u64) -> u64 {
    ms.saturating_add(500) / 1000
}

/// Rounds bytes to the nearest whole decimal megabyte.
#[must_use]
pub const fn round_bytes_to_mb(bytes: u64) -> u64 {
    bytes.saturating_add(BYTES_PER_MB / 2) / BYTES_PER_MB
}
