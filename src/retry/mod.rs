//! Bounded retries with jittered exponential backoff.
//!
//! - **Policy is data**: [`RetryPolicy`] only computes intervals and decides
//!   when the budget is spent. It has no side effects and can be shared by
//!   reference across concurrent runs.
//! - **The executor owns the loop**: [`RetryExecutor`] invokes an operation,
//!   sleeps between attempts, and stops on success, exhaustion, cancellation or
//!   a permanent error.
//! - **Observability is injected**: the loop reports to a [`RetryObserver`]
//!   instead of logging directly.
//!
//! # Quick Start
//!
//! ```rust
//! use fleet_harness::retry::{retry, Outcome, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::exponential(Duration::from_millis(1))
//!     .with_max_retries(2);
//!
//! let outcome = retry(|| async { Err::<(), _>("still booting") }, &policy, None).await;
//!
//! match outcome {
//!     Outcome::Exhausted(exhausted) => {
//!         assert_eq!(exhausted.attempts, 3); // 1 initial + 2 retries
//!         assert_eq!(exhausted.final_error, "still booting");
//!     }
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! # });
//! ```
//!
//! # Cancellation
//!
//! Pass a [`CancellationToken`](tokio_util::sync::CancellationToken) to stop
//! retrying. A pending wait is interrupted immediately; an attempt that is
//! already running is allowed to finish.

mod error;
mod executor;
mod observer;
mod outcome;
mod policy;

pub use error::{FailureReason, PolicyError, RetryError, RetryExhausted, RetryFailure};
pub use executor::{retry, RetryExecutor};
pub use observer::{
    observe_fn, FnObserver, NoopObserver, RetryEvent, RetryFinished, RetryObserver,
    TracingObserver,
};
pub use outcome::{Outcome, OutcomeKind};
pub use policy::{
    RetryPolicy, DEFAULT_INITIAL_INTERVAL, DEFAULT_MAX_ELAPSED_TIME, DEFAULT_MAX_INTERVAL,
    DEFAULT_MULTIPLIER, DEFAULT_RANDOMIZATION_FACTOR,
};
