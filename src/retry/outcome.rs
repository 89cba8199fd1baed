//! The result of a retried run.

use std::time::Duration;

use super::error::{FailureReason, RetryError, RetryExhausted, RetryFailure};

/// Terminal state of one [`RetryExecutor`](super::RetryExecutor) run.
///
/// Every non-success variant that follows at least one attempt carries the
/// error of the *last* attempt together with the attempt count and the time
/// spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The operation succeeded.
    Success(T),
    /// Retrying stopped early: cancelled, or a permanent error.
    Failure(RetryFailure<E>),
    /// The policy's budget was spent.
    Exhausted(RetryExhausted<E>),
    /// Cancelled before the first attempt ran.
    CancelledNoAttempt,
}

/// Outcome variant without the payload, for observers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// See [`Outcome::Success`].
    Success,
    /// See [`Outcome::Failure`].
    Failure(FailureReason),
    /// See [`Outcome::Exhausted`].
    Exhausted,
    /// See [`Outcome::CancelledNoAttempt`].
    CancelledNoAttempt,
}

impl<T, E> Outcome<T, E> {
    /// Returns true for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true for [`Outcome::Exhausted`].
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// Returns true if the run ended because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Failure(failure) => failure.is_cancelled(),
            Self::CancelledNoAttempt => true,
            Self::Success(_) | Self::Exhausted(_) => false,
        }
    }

    /// The payload-free variant.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::Failure(failure) => OutcomeKind::Failure(failure.reason),
            Self::Exhausted(_) => OutcomeKind::Exhausted,
            Self::CancelledNoAttempt => OutcomeKind::CancelledNoAttempt,
        }
    }

    /// Attempts made, when the outcome records them.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Failure(failure) => Some(failure.attempts),
            Self::Exhausted(exhausted) => Some(exhausted.attempts),
            Self::CancelledNoAttempt => Some(0),
            Self::Success(_) => None,
        }
    }

    /// Time spent, when the outcome records it.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            Self::Failure(failure) => Some(failure.elapsed),
            Self::Exhausted(exhausted) => Some(exhausted.total_duration),
            Self::CancelledNoAttempt => Some(Duration::ZERO),
            Self::Success(_) => None,
        }
    }

    /// The last operation error, if the run failed after an attempt.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Failure(failure) => Some(&failure.error),
            Self::Exhausted(exhausted) => Some(&exhausted.final_error),
            Self::Success(_) | Self::CancelledNoAttempt => None,
        }
    }

    /// Collapse into a `Result` so the outcome composes with `?`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fleet_harness::{Outcome, RetryError};
    ///
    /// let ok: Outcome<u8, &str> = Outcome::Success(1);
    /// assert_eq!(ok.into_result(), Ok(1));
    ///
    /// let cancelled: Outcome<u8, &str> = Outcome::CancelledNoAttempt;
    /// assert_eq!(cancelled.into_result(), Err(RetryError::CancelledNoAttempt));
    /// ```
    pub fn into_result(self) -> Result<T, RetryError<E>> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(failure) => Err(RetryError::Failed(failure)),
            Self::Exhausted(exhausted) => Err(RetryError::Exhausted(exhausted)),
            Self::CancelledNoAttempt => Err(RetryError::CancelledNoAttempt),
        }
    }

    /// Map the success value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U, E> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Failure(failure) => Outcome::Failure(failure),
            Self::Exhausted(exhausted) => Outcome::Exhausted(exhausted),
            Self::CancelledNoAttempt => Outcome::CancelledNoAttempt,
        }
    }
}

impl<T, E> From<Outcome<T, E>> for Result<T, RetryError<E>> {
    fn from(outcome: Outcome<T, E>) -> Self {
        outcome.into_result()
    }
}
