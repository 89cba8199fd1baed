//! Testing utilities for code that retries.
//!
//! Provides an observer that records what the executor did, a scripted
//! operation that fails a fixed number of times, and assertion macros for
//! [`Outcome`](crate::Outcome).
//!
//! # Examples
//!
//! ```rust
//! use fleet_harness::testing::{FlakyOperation, RecordingObserver};
//! use fleet_harness::{assert_success, RetryExecutor, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let flaky = FlakyOperation::failing(2);
//! let recorder = RecordingObserver::new();
//! let policy = RetryPolicy::exponential(Duration::from_millis(1))
//!     .with_randomization_factor(0.0);
//!
//! let outcome = RetryExecutor::new()
//!     .with_observer(&recorder)
//!     .run(|| flaky.call(), &policy, None)
//!     .await;
//!
//! assert_success!(outcome);
//! assert_eq!(flaky.calls(), 3);
//! assert_eq!(recorder.retries().len(), 2);
//! # });
//! ```

use std::future::{ready, Ready};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::retry::{RetryEvent, RetryFinished, RetryObserver};

/// A retried failure as seen by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRetry {
    /// Attempt that failed (1-indexed).
    pub attempt: u32,
    /// Wait scheduled after it.
    pub next_delay: Duration,
    /// Elapsed time when it failed.
    pub elapsed: Duration,
    /// `Debug` rendering of the error.
    pub error: String,
}

/// Observer that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    retries: Mutex<Vec<RecordedRetry>>,
    finished: Mutex<Vec<RetryFinished>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every retried failure, in order.
    pub fn retries(&self) -> Vec<RecordedRetry> {
        self.retries
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// The waits the executor scheduled, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.retries().into_iter().map(|r| r.next_delay).collect()
    }

    /// The final event of the most recent run.
    pub fn finished(&self) -> Option<RetryFinished> {
        self.finished
            .lock()
            .map(|f| f.last().copied())
            .unwrap_or_else(|poisoned| poisoned.into_inner().last().copied())
    }

    /// Number of runs that have finished.
    pub fn runs(&self) -> usize {
        self.finished
            .lock()
            .map(|f| f.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

impl<E: std::fmt::Debug> RetryObserver<E> for RecordingObserver {
    fn on_retry(&self, event: &RetryEvent<'_, E>) {
        let record = RecordedRetry {
            attempt: event.attempt,
            next_delay: event.next_delay,
            elapsed: event.elapsed,
            error: format!("{:?}", event.error),
        };
        match self.retries.lock() {
            Ok(mut retries) => retries.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }

    fn on_finish(&self, finished: &RetryFinished) {
        match self.finished.lock() {
            Ok(mut all) => all.push(*finished),
            Err(poisoned) => poisoned.into_inner().push(*finished),
        }
    }
}

/// An operation that fails a fixed number of times, then succeeds.
///
/// Each successful call resolves to the 1-indexed call number; each failure
/// to `"attempt N failed"`.
#[derive(Debug)]
pub struct FlakyOperation {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyOperation {
    /// Fail the first `failures` calls.
    pub fn failing(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    /// Fail on every call.
    pub fn always_failing() -> Self {
        Self::failing(u32::MAX)
    }

    /// Invoke the operation once.
    pub fn call(&self) -> Ready<Result<u32, String>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            ready(Err(format!("attempt {n} failed")))
        } else {
            ready(Ok(n))
        }
    }

    /// How many times the operation has been invoked.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Assert that an outcome is a success.
///
/// # Example
///
/// ```rust
/// use fleet_harness::{assert_success, Outcome};
///
/// let outcome: Outcome<_, String> = Outcome::Success(42);
/// assert_success!(outcome);
/// ```
#[macro_export]
macro_rules! assert_success {
    ($outcome:expr) => {
        match $outcome {
            $crate::Outcome::Success(_) => {}
            other => panic!("Expected Success, got {:?}", other),
        }
    };
}

/// Assert that an outcome is an exhausted budget with the given final error.
///
/// # Example
///
/// ```rust
/// use fleet_harness::{assert_exhausted, Outcome, RetryExhausted};
/// use std::time::Duration;
///
/// let outcome: Outcome<(), _> =
///     Outcome::Exhausted(RetryExhausted::new("refused", 3, Duration::from_secs(1)));
/// assert_exhausted!(outcome, "refused");
/// ```
#[macro_export]
macro_rules! assert_exhausted {
    ($outcome:expr, $error:expr) => {
        match $outcome {
            $crate::Outcome::Exhausted(exhausted) => {
                assert_eq!(exhausted.final_error, $error);
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
    };
}
