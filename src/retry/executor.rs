//! The retry loop.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{FailureReason, RetryExhausted, RetryFailure};
use super::observer::{NoopObserver, RetryEvent, RetryFinished, RetryObserver};
use super::outcome::{Outcome, OutcomeKind};
use super::policy::RetryPolicy;

/// Runs fallible operations under a [`RetryPolicy`].
///
/// The executor itself holds only an observer; all per-run state lives on the
/// stack of [`run`](Self::run), so one executor and one policy can drive any
/// number of concurrent runs.
///
/// # Example
///
/// ```rust
/// use fleet_harness::{Outcome, RetryExecutor, RetryPolicy};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let policy = RetryPolicy::exponential(Duration::from_millis(1))
///     .with_randomization_factor(0.0)
///     .with_max_interval(Duration::from_millis(4));
///
/// let mut calls = 0;
/// let outcome = RetryExecutor::new()
///     .run(
///         || {
///             calls += 1;
///             let n = calls;
///             async move { if n < 3 { Err("not yet") } else { Ok(n) } }
///         },
///         &policy,
///         None,
///     )
///     .await;
///
/// assert_eq!(outcome, Outcome::Success(3));
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor<O = NoopObserver> {
    observer: O,
}

/// Per-run bookkeeping, mutated once per failed attempt.
#[derive(Debug)]
struct RetryState {
    attempt: u32,
    elapsed: Duration,
    current_interval: Duration,
}

impl RetryExecutor {
    /// Create an executor without an observer.
    pub fn new() -> Self {
        Self {
            observer: NoopObserver,
        }
    }
}

impl<O> RetryExecutor<O> {
    /// Replace the observer.
    pub fn with_observer<P>(self, observer: P) -> RetryExecutor<P> {
        RetryExecutor { observer }
    }

    /// Get the observer.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Invoke `operation` until it succeeds, the policy is exhausted, or
    /// `cancel` fires.
    ///
    /// Every error is treated as transient. Cancellation interrupts the wait
    /// between attempts but never an attempt in flight.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: F,
        policy: &RetryPolicy,
        cancel: Option<&CancellationToken>,
    ) -> Outcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        O: RetryObserver<E>,
    {
        self.run_if(operation, policy, cancel, |_: &E| true).await
    }

    /// Like [`run`](Self::run), but stops at the first error for which
    /// `should_retry` returns false.
    ///
    /// Such an error ends the run with [`Outcome::Failure`] and
    /// [`FailureReason::Permanent`].
    pub async fn run_if<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        policy: &RetryPolicy,
        cancel: Option<&CancellationToken>,
        mut should_retry: P,
    ) -> Outcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
        O: RetryObserver<E>,
    {
        let start = Instant::now();
        let mut state = RetryState {
            attempt: 0,
            elapsed: Duration::ZERO,
            current_interval: policy.initial_interval(),
        };

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            self.finish::<E>(OutcomeKind::CancelledNoAttempt, &state);
            return Outcome::CancelledNoAttempt;
        }

        loop {
            let result = operation().await;
            state.elapsed = start.elapsed();
            state.attempt += 1;

            let error = match result {
                Ok(value) => {
                    self.finish::<E>(OutcomeKind::Success, &state);
                    return Outcome::Success(value);
                }
                Err(error) => error,
            };

            if !should_retry(&error) {
                return self.stop(error, FailureReason::Permanent, &state);
            }
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return self.stop(error, FailureReason::Cancelled, &state);
            }
            if policy.is_exhausted(state.elapsed) || policy.attempts_exhausted(state.attempt) {
                self.finish::<E>(OutcomeKind::Exhausted, &state);
                return Outcome::Exhausted(RetryExhausted::new(
                    error,
                    state.attempt,
                    state.elapsed,
                ));
            }

            let delay = policy.randomize(state.current_interval);
            self.observer.on_retry(&RetryEvent {
                attempt: state.attempt,
                error: &error,
                next_delay: delay,
                elapsed: state.elapsed,
            });

            match cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            state.elapsed = start.elapsed();
                            return self.stop(error, FailureReason::Cancelled, &state);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }

            state.current_interval = policy.grow(state.current_interval);
        }
    }

    fn stop<T, E>(&self, error: E, reason: FailureReason, state: &RetryState) -> Outcome<T, E>
    where
        O: RetryObserver<E>,
    {
        self.finish::<E>(OutcomeKind::Failure(reason), state);
        Outcome::Failure(RetryFailure::new(
            error,
            reason,
            state.attempt,
            state.elapsed,
        ))
    }

    fn finish<E>(&self, kind: OutcomeKind, state: &RetryState)
    where
        O: RetryObserver<E>,
    {
        self.observer.on_finish(&RetryFinished {
            kind,
            attempts: state.attempt,
            elapsed: state.elapsed,
        });
    }
}

/// Run `operation` under `policy` with no observer.
///
/// Shorthand for `RetryExecutor::new().run(operation, policy, cancel)`.
pub async fn retry<T, E, F, Fut>(
    operation: F,
    policy: &RetryPolicy,
    cancel: Option<&CancellationToken>,
) -> Outcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    RetryExecutor::new().run(operation, policy, cancel).await
}
