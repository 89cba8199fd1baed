//! Error types for retry operations.

use std::fmt;
use std::time::Duration;

/// Error returned when the retry budget is spent without a success.
///
/// Contains the error from the final attempt along with metadata about the
/// retry sequence.
///
/// # Examples
///
/// ```rust
/// use fleet_harness::RetryExhausted;
/// use std::time::Duration;
///
/// let exhausted = RetryExhausted::new("connection refused", 7, Duration::from_secs(17));
/// assert_eq!(exhausted.attempts, 7);
/// assert_eq!(exhausted.into_error(), "connection refused");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// The error from the final attempt.
    pub final_error: E,
    /// Total number of attempts made (initial + retries).
    pub attempts: u32,
    /// Total time spent retrying.
    pub total_duration: Duration,
}

impl<E> RetryExhausted<E> {
    /// Create a new RetryExhausted error.
    pub fn new(final_error: E, attempts: u32, total_duration: Duration) -> Self {
        Self {
            final_error,
            attempts,
            total_duration,
        }
    }

    /// Extract the final error, discarding metadata.
    pub fn into_error(self) -> E {
        self.final_error
    }

    /// Get a reference to the final error.
    pub fn error(&self) -> &E {
        &self.final_error
    }
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "retry exhausted after {} attempts ({:?}): {}",
            self.attempts, self.total_duration, self.final_error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.final_error)
    }
}

/// Why a run stopped before its budget was spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The cancellation token fired.
    Cancelled,
    /// The operation reported an error that must not be retried.
    Permanent,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::Permanent => f.write_str("permanent error"),
        }
    }
}

/// A run that ended early, carrying the last observed error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    /// The error from the last attempt.
    pub error: E,
    /// Why retrying stopped.
    pub reason: FailureReason,
    /// Number of attempts made.
    pub attempts: u32,
    /// Time since the first attempt started.
    pub elapsed: Duration,
}

impl<E> RetryFailure<E> {
    /// Create a new RetryFailure.
    pub fn new(error: E, reason: FailureReason, attempts: u32, elapsed: Duration) -> Self {
        Self {
            error,
            reason,
            attempts,
            elapsed,
        }
    }

    /// Extract the last error, discarding metadata.
    pub fn into_error(self) -> E {
        self.error
    }

    /// Returns true if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.reason == FailureReason::Cancelled
    }
}

impl<E: fmt::Display> fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "retry stopped ({}) after {} attempts ({:?}): {}",
            self.reason, self.attempts, self.elapsed, self.error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryFailure<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Any non-success outcome, for callers that want a `Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Stopped early; see [`RetryFailure`].
    Failed(RetryFailure<E>),
    /// Budget spent; see [`RetryExhausted`].
    Exhausted(RetryExhausted<E>),
    /// Cancelled before the operation ever ran.
    CancelledNoAttempt,
}

impl<E> RetryError<E> {
    /// The last operation error, if any attempt ran.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Failed(failure) => Some(&failure.error),
            Self::Exhausted(exhausted) => Some(&exhausted.final_error),
            Self::CancelledNoAttempt => None,
        }
    }

    /// Extract the last operation error, if any attempt ran.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::Failed(failure) => Some(failure.error),
            Self::Exhausted(exhausted) => Some(exhausted.final_error),
            Self::CancelledNoAttempt => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(failure) => failure.fmt(f),
            Self::Exhausted(exhausted) => exhausted.fmt(f),
            Self::CancelledNoAttempt => f.write_str("cancelled before the first attempt"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last_error().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// A policy that breaks one of its invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    /// `initial_interval` must be positive.
    #[error("initial interval must be greater than zero")]
    ZeroInitialInterval,
    /// `multiplier` must be a finite number above 1.
    #[error("multiplier must be greater than 1, got {0}")]
    MultiplierTooSmall(f64),
    /// `randomization_factor` must lie in `[0, 1)`.
    #[error("randomization factor must be in [0, 1), got {0}")]
    RandomizationOutOfRange(f64),
    /// `max_interval` must not be below `initial_interval`.
    #[error("max interval {max_interval:?} is below the initial interval {initial_interval:?}")]
    MaxIntervalBelowInitial {
        /// Configured cap.
        max_interval: Duration,
        /// Configured initial interval.
        initial_interval: Duration,
    },
    /// A finite `max_elapsed_time` must not be below `initial_interval`.
    #[error(
        "max elapsed time {max_elapsed_time:?} is below the initial interval {initial_interval:?}"
    )]
    ElapsedBudgetBelowInitial {
        /// Configured budget.
        max_elapsed_time: Duration,
        /// Configured initial interval.
        initial_interval: Duration,
    },
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_retry_exhausted_display() {
        let err = RetryExhausted::new("connection failed", 3, Duration::from_millis(500));
        let display = format!("{}", err);
        assert!(display.contains("retry exhausted"));
        assert!(display.contains("3 attempts"));
        assert!(display.contains("connection failed"));
    }

    #[test]
    fn test_retry_exhausted_into_error() {
        let err = RetryExhausted::new("test error", 5, Duration::from_secs(1));
        assert_eq!(err.error(), &"test error");
        assert_eq!(err.into_error(), "test error");
    }

    #[test]
    fn test_retry_failure_display() {
        let err = RetryFailure::new(
            "tag failed",
            FailureReason::Cancelled,
            2,
            Duration::from_millis(700),
        );
        assert!(err.is_cancelled());
        let display = err.to_string();
        assert!(display.contains("cancelled"));
        assert!(display.contains("2 attempts"));
        assert!(display.contains("tag failed"));
    }

    #[test]
    fn test_retry_error_last_error() {
        let failed = RetryError::Failed(RetryFailure::new(
            "boom",
            FailureReason::Permanent,
            1,
            Duration::ZERO,
        ));
        assert_eq!(failed.last_error(), Some(&"boom"));

        let none: RetryError<&str> = RetryError::CancelledNoAttempt;
        assert_eq!(none.last_error(), None);
        assert_eq!(none.to_string(), "cancelled before the first attempt");
    }

    #[test]
    fn test_retry_error_source_is_last_error() {
        use std::error::Error;

        let inner = std::io::Error::other("engine not ready");
        let err = RetryError::Exhausted(RetryExhausted::new(inner, 4, Duration::from_secs(2)));
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("engine not ready"));
    }

    #[test]
    fn test_policy_error_display() {
        assert_eq!(
            PolicyError::MultiplierTooSmall(0.5).to_string(),
            "multiplier must be greater than 1, got 0.5"
        );
    }
}
