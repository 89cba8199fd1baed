//! # fleet-harness
//!
//! Building blocks for end-to-end suites that drive a container engine and a
//! fleet agent.
//!
//! ## Philosophy
//!
//! The suites are thin sequential glue; the one piece with real invariants is
//! retrying calls that race with engine readiness. That piece lives in
//! [`retry`] as pure policy data plus a small executor. Everything that
//! touches the outside world sits behind a trait and is passed in:
//!
//! - [`runtime::ContainerRuntime`] for the container engine
//! - [`fleet::AgentLauncher`] for the agent binary
//!
//! ## Quick Example
//!
//! ```rust
//! use fleet_harness::{Outcome, RetryExecutor, RetryPolicy, TracingObserver};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::exponential(Duration::from_millis(1))
//!     .with_max_retries(5);
//! let executor = RetryExecutor::new().with_observer(TracingObserver::new("ping"));
//!
//! let mut pending = 2;
//! let outcome = executor
//!     .run(
//!         || {
//!             pending -= 1;
//!             let ready = pending < 0;
//!             async move { if ready { Ok("pong") } else { Err("engine starting") } }
//!         },
//!         &policy,
//!         None,
//!     )
//!     .await;
//!
//! assert_eq!(outcome, Outcome::Success("pong"));
//! # });
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod fleet;
pub mod retry;
pub mod runtime;
pub mod testing;

// Re-exports
pub use retry::{
    retry, FailureReason, Outcome, OutcomeKind, PolicyError, RetryError, RetryExecutor,
    RetryExhausted, RetryFailure, RetryObserver, RetryPolicy, TracingObserver,
};
pub use runtime::{ContainerRuntime, Containers, RuntimeError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fleet::{AgentLauncher, FleetConfig};
    pub use crate::retry::{Outcome, RetryExecutor, RetryObserver, RetryPolicy};
    pub use crate::runtime::{ContainerRuntime, Containers, RuntimeError};
}
