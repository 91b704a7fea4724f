//! Deadline-aware execution timers.
//!
//! The caller starts a timer and hands it to the orchestrator, which passes it
//! through to every stage. Stages poll [`ExecutionTimer::check_deadline`] and
//! raise a stage-specific timeout when the deadline has passed; the
//! orchestrator itself never cancels anything.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Stage, StageError};

/// A started, deadline-aware run timer.
pub trait ExecutionTimer: Send + Sync + fmt::Debug {
    /// Starts (or restarts) the timer.
    fn start(&self);

    /// Milliseconds elapsed since [`ExecutionTimer::start`], or zero if the
    /// timer was never started.
    fn split_runtime_ms(&self) -> u64;

    /// Deadline in milliseconds after start, if the run is time-bounded.
    fn deadline_ms(&self) -> Option<u64>;

    /// Returns `true` once the deadline has passed.
    fn is_past_deadline(&self) -> bool {
        self.deadline_ms()
            .is_some_and(|deadline| self.split_runtime_ms() >= deadline)
    }

    /// Time left before the deadline. `None` means unbounded.
    fn remaining(&self) -> Option<Duration> {
        self.deadline_ms().map(|deadline| {
            Duration::from_millis(deadline.saturating_sub(self.split_runtime_ms()))
        })
    }

    /// Fails with a timeout for `stage` once the deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] of kind timeout when past the deadline.
    fn check_deadline(&self, stage: Stage) -> Result<(), StageError> {
        if self.is_past_deadline() {
            return Err(StageError::timeout(
                stage,
                format!(
                    "deadline of {} ms exceeded after {} ms",
                    self.deadline_ms().unwrap_or_default(),
                    self.split_runtime_ms()
                ),
            ));
        }
        Ok(())
    }
}

/// Monotonic-clock [`ExecutionTimer`].
#[derive(Debug)]
pub struct DeadlineTimer {
    started_at: Mutex<Option<Instant>>,
    deadline: Option<Duration>,
}

impl DeadlineTimer {
    /// Creates an unstarted timer with no deadline.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            started_at: Mutex::new(None),
            deadline: None,
        }
    }

    /// Creates an unstarted timer that expires `deadline` after start.
    #[must_use]
    pub const fn with_deadline(deadline: Duration) -> Self {
        Self {
            started_at: Mutex::new(None),
            deadline: Some(deadline),
        }
    }

    /// Creates and starts a timer.
    #[must_use]
    pub fn started(deadline: Option<Duration>) -> Self {
        let timer = Self {
            started_at: Mutex::new(None),
            deadline,
        };
        timer.start();
        timer
    }
}

impl ExecutionTimer for DeadlineTimer {
    fn start(&self) {
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn split_runtime_ms(&self) -> u64 {
        let started_at = *self.started_at.lock().unwrap_or_else(PoisonError::into_inner);
        started_at.map_or(0, |start| {
            u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
        })
    }

    fn deadline_ms(&self) -> Option<u64> {
        self.deadline
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_unstarted_timer_reads_zero() {
        let timer = DeadlineTimer::unbounded();
        assert_eq!(timer.split_runtime_ms(), 0);
        assert!(!timer.is_past_deadline());
        assert_eq!(timer.remaining(), None);
    }

    #[test]
    fn test_zero_deadline_expires_immediately() {
        let timer = DeadlineTimer::started(Some(Duration::ZERO));
        assert!(timer.is_past_deadline());
        let err = timer.check_deadline(Stage::Fit).unwrap_err();
        assert_eq!(err.stage, Stage::Fit);
        assert_eq!(err.kind, FailureKind::Timeout);
    }

    #[test]
    fn test_generous_deadline_not_expired() {
        let timer = DeadlineTimer::started(Some(Duration::from_secs(3600)));
        assert!(timer.check_deadline(Stage::Simulate).is_ok());
        assert!(timer.remaining().unwrap() > Duration::from_secs(3000));
    }
}
