//! Plain-data configuration.
//!
//! [`RetryConfig`] is the flat, millisecond-based form of a
//! [`RetryPolicy`] that suites keep in fixtures or environment-specific files.
//! With the `serde` feature it deserializes directly; converting it into a
//! policy validates every invariant.
//!
//! ```rust
//! use fleet_harness::config::RetryConfig;
//! use fleet_harness::RetryPolicy;
//! use std::time::Duration;
//!
//! let config = RetryConfig {
//!     initial_interval_ms: 500,
//!     multiplier: 2.0,
//!     randomization_factor: 0.5,
//!     max_interval_ms: 5_000,
//!     max_elapsed_time_ms: 15_000,
//!     max_retries: None,
//! };
//!
//! let policy = RetryPolicy::try_from(config).unwrap();
//! assert_eq!(policy, RetryPolicy::image_tag());
//! ```

use std::time::Duration;

use crate::retry::{
    PolicyError, RetryPolicy, DEFAULT_INITIAL_INTERVAL, DEFAULT_MAX_ELAPSED_TIME,
    DEFAULT_MAX_INTERVAL, DEFAULT_MULTIPLIER, DEFAULT_RANDOMIZATION_FACTOR,
};

/// Default name of the private network the suites attach containers to.
pub const DEFAULT_NETWORK_NAME: &str = "elastic-dev-network";

/// Default value of the `service.owner` label on harness-managed containers.
pub const DEFAULT_SERVICE_OWNER: &str = "co.elastic.observability";

/// Serializable retry settings.
///
/// `max_elapsed_time_ms = 0` means "no elapsed budget".
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// First wait, in milliseconds.
    pub initial_interval_ms: u64,
    /// Growth factor per failure.
    pub multiplier: f64,
    /// Jitter as a fraction of the interval.
    pub randomization_factor: f64,
    /// Interval cap, in milliseconds.
    pub max_interval_ms: u64,
    /// Elapsed budget in milliseconds; 0 disables it.
    pub max_elapsed_time_ms: u64,
    /// Optional retry cap.
    pub max_retries: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: DEFAULT_INITIAL_INTERVAL.as_millis() as u64,
            multiplier: DEFAULT_MULTIPLIER,
            randomization_factor: DEFAULT_RANDOMIZATION_FACTOR,
            max_interval_ms: DEFAULT_MAX_INTERVAL.as_millis() as u64,
            max_elapsed_time_ms: DEFAULT_MAX_ELAPSED_TIME.as_millis() as u64,
            max_retries: None,
        }
    }
}

impl TryFrom<RetryConfig> for RetryPolicy {
    type Error = PolicyError;

    fn try_from(config: RetryConfig) -> Result<Self, Self::Error> {
        let mut policy = RetryPolicy::exponential(Duration::from_millis(config.initial_interval_ms))
            .with_multiplier(config.multiplier)
            .with_randomization_factor(config.randomization_factor)
            .with_max_interval(Duration::from_millis(config.max_interval_ms))
            .with_max_elapsed_time(Duration::from_millis(config.max_elapsed_time_ms));
        if let Some(n) = config.max_retries {
            policy = policy.with_max_retries(n);
        }
        policy.validate()?;
        Ok(policy)
    }
}

impl From<&RetryPolicy> for RetryConfig {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            initial_interval_ms: policy.initial_interval().as_millis() as u64,
            multiplier: policy.multiplier(),
            randomization_factor: policy.randomization_factor(),
            max_interval_ms: policy.max_interval().as_millis() as u64,
            max_elapsed_time_ms: policy
                .max_elapsed_time()
                .map_or(0, |d| d.as_millis() as u64),
            max_retries: policy.max_retries(),
        }
    }
}

/// Settings shared by the container helpers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HarnessSettings {
    /// Private network name.
    pub network_name: String,
    /// `service.owner` label used to find harness containers.
    pub service_owner: String,
    /// Retry settings for image tagging.
    pub tag_retry: RetryConfig,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            network_name: DEFAULT_NETWORK_NAME.to_string(),
            service_owner: DEFAULT_SERVICE_OWNER.to_string(),
            tag_retry: RetryConfig::from(&RetryPolicy::image_tag()),
        }
    }
}
