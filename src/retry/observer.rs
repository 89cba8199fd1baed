//! Observability hooks for retried runs.
//!
//! The executor never logs on its own. It reports every retried failure and
//! the final outcome to a [`RetryObserver`] chosen by the caller.

use std::fmt;
use std::time::Duration;

use super::outcome::OutcomeKind;

/// Information about a failed attempt that is about to be retried.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a E,
    /// Delay before the next attempt.
    pub next_delay: Duration,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryFinished {
    /// How the run ended.
    pub kind: OutcomeKind,
    /// Number of times the operation was invoked.
    pub attempts: u32,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Receives structured events from a [`RetryExecutor`](super::RetryExecutor).
///
/// Both hooks are synchronous and run on the retrying task; they should not
/// block.
pub trait RetryObserver<E> {
    /// Called after a failed attempt, before sleeping.
    ///
    /// `next_delay` is the planned wait. Cancellation can cut that wait
    /// short, in which case no further attempt follows and
    /// [`on_finish`](Self::on_finish) reports `Failure(Cancelled)` with an
    /// `elapsed` below `event.elapsed + event.next_delay`.
    fn on_retry(&self, _event: &RetryEvent<'_, E>) {}

    /// Called exactly once when the run ends.
    fn on_finish(&self, _finished: &RetryFinished) {}
}

impl<E, O: RetryObserver<E> + ?Sized> RetryObserver<E> for &O {
    fn on_retry(&self, event: &RetryEvent<'_, E>) {
        (**self).on_retry(event)
    }

    fn on_finish(&self, finished: &RetryFinished) {
        (**self).on_finish(finished)
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<E> RetryObserver<E> for NoopObserver {}

/// Adapts a closure into an observer of retried failures.
///
/// # Examples
///
/// ```rust
/// use fleet_harness::retry::{observe_fn, RetryEvent, RetryObserver};
/// use std::cell::Cell;
/// use std::time::Duration;
///
/// let calls = Cell::new(0);
/// let observer = observe_fn(|_: &RetryEvent<'_, &str>| calls.set(calls.get() + 1));
/// observer.on_retry(&RetryEvent {
///     attempt: 1,
///     error: &"refused",
///     next_delay: Duration::from_millis(500),
///     elapsed: Duration::ZERO,
/// });
/// assert_eq!(calls.get(), 1);
/// ```
pub fn observe_fn<F>(f: F) -> FnObserver<F> {
    FnObserver(f)
}

/// Closure observer, built by [`observe_fn`].
#[derive(Clone, Copy)]
pub struct FnObserver<F>(F);

impl<F> fmt::Debug for FnObserver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver").finish_non_exhaustive()
    }
}

impl<E, F> RetryObserver<E> for FnObserver<F>
where
    F: Fn(&RetryEvent<'_, E>),
{
    fn on_retry(&self, event: &RetryEvent<'_, E>) {
        (self.0)(event)
    }
}

/// Observer that emits `tracing` events.
///
/// Retried failures are logged at `WARN`, successes at `DEBUG`, and every
/// other terminal outcome at `WARN`.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    /// Create an observer that labels its events with `operation`.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// The label attached to every event.
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl<E: fmt::Display> RetryObserver<E> for TracingObserver {
    fn on_retry(&self, event: &RetryEvent<'_, E>) {
        tracing::warn!(
            operation = %self.operation,
            attempt = event.attempt,
            delay_ms = event.next_delay.as_millis() as u64,
            elapsed_ms = event.elapsed.as_millis() as u64,
            error = %event.error,
            "attempt failed, retrying"
        );
    }

    fn on_finish(&self, finished: &RetryFinished) {
        let elapsed_ms = finished.elapsed.as_millis() as u64;
        match finished.kind {
            OutcomeKind::Success => tracing::debug!(
                operation = %self.operation,
                attempts = finished.attempts,
                elapsed_ms,
                "operation succeeded"
            ),
            OutcomeKind::Exhausted => tracing::warn!(
                operation = %self.operation,
                attempts = finished.attempts,
                elapsed_ms,
                "retry budget exhausted"
            ),
            OutcomeKind::Failure(reason) => tracing::warn!(
                operation = %self.operation,
                attempts = finished.attempts,
                elapsed_ms,
                %reason,
                "retry stopped"
            ),
            OutcomeKind::CancelledNoAttempt => tracing::debug!(
                operation = %self.operation,
                "cancelled before the first attempt"
            ),
        }
    }
}
