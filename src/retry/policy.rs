//! Retry policy types and configuration.

use std::time::Duration;

use rand::Rng;

use super::error::PolicyError;

/// A jittered exponential backoff policy.
///
/// Policies are pure data - they describe retry behavior but don't execute it.
/// A policy is immutable once built and can be shared by reference across any
/// number of concurrent [`RetryExecutor`](super::RetryExecutor) runs.
///
/// # Bounds Behavior
///
/// - `max_elapsed_time`: retrying stops once the elapsed time of a run exceeds
///   this budget. A zero or unset budget retries until cancelled.
/// - `max_retries`: optional cap on retries (not counting the initial attempt).
///
/// # Examples
///
/// ```rust
/// use fleet_harness::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential(Duration::from_millis(500))
///     .with_multiplier(2.0)
///     .with_randomization_factor(0.0)
///     .with_max_interval(Duration::from_secs(5))
///     .with_max_elapsed_time(Duration::from_secs(15));
///
/// assert!(policy.validate().is_ok());
/// assert_eq!(policy.next_interval(Duration::from_millis(500)), Duration::from_secs(1));
/// assert_eq!(policy.next_interval(Duration::from_secs(4)), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    initial_interval: Duration,
    multiplier: f64,
    randomization_factor: f64,
    max_interval: Duration,
    max_elapsed_time: Option<Duration>,
    max_retries: Option<u32>,
}

/// Default initial interval.
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(500);
/// Default growth factor applied after every failed attempt.
pub const DEFAULT_MULTIPLIER: f64 = 1.5;
/// Default jitter, as a fraction of the interval.
pub const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.5;
/// Default interval cap.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
/// Default elapsed-time budget.
pub const DEFAULT_MAX_ELAPSED_TIME: Duration = Duration::from_secs(15 * 60);

impl RetryPolicy {
    /// Create an exponential policy starting at `initial_interval`.
    ///
    /// Every other parameter takes its default: ×1.5 growth, ±50% jitter,
    /// a 60s interval cap and a 15 minute elapsed budget.
    pub fn exponential(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            ..Self::default()
        }
    }

    /// Policy used when tagging freshly loaded images.
    ///
    /// The engine can report an image as loaded slightly before a tag on it
    /// succeeds, so tagging retries for up to 15 seconds.
    pub fn image_tag() -> Self {
        Self::exponential(Duration::from_millis(500))
            .with_multiplier(2.0)
            .with_randomization_factor(0.5)
            .with_max_interval(Duration::from_secs(5))
            .with_max_elapsed_time(Duration::from_secs(15))
    }

    /// Set the growth factor applied to the interval after each failure.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the jitter factor.
    ///
    /// Each wait is sampled uniformly from `interval * (1 ± factor)`.
    /// `0.0` disables jitter.
    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor;
        self
    }

    /// Cap the (pre-jitter) interval.
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    /// Set the elapsed-time budget. `Duration::ZERO` removes the budget.
    pub fn with_max_elapsed_time(mut self, max_elapsed_time: Duration) -> Self {
        self.max_elapsed_time = if max_elapsed_time.is_zero() {
            None
        } else {
            Some(max_elapsed_time)
        };
        self
    }

    /// Retry until success or cancellation, however long it takes.
    pub fn without_elapsed_limit(mut self) -> Self {
        self.max_elapsed_time = None;
        self
    }

    /// Cap the number of retries.
    ///
    /// This does not include the initial attempt: `with_max_retries(3)` means
    /// up to 4 calls.
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Get the initial interval.
    pub fn initial_interval(&self) -> Duration {
        self.initial_interval
    }

    /// Get the multiplier.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Get the randomization factor.
    pub fn randomization_factor(&self) -> f64 {
        self.randomization_factor
    }

    /// Get the interval cap.
    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Get the elapsed-time budget, `None` when unbounded.
    pub fn max_elapsed_time(&self) -> Option<Duration> {
        self.max_elapsed_time
    }

    /// Get the maximum number of retries.
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Grow `current` by the multiplier, capped at `max_interval`. No jitter.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fleet_harness::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(100))
    ///     .with_multiplier(2.0)
    ///     .with_max_interval(Duration::from_millis(300));
    ///
    /// assert_eq!(policy.grow(Duration::from_millis(100)), Duration::from_millis(200));
    /// assert_eq!(policy.grow(Duration::from_millis(200)), Duration::from_millis(300));
    /// ```
    pub fn grow(&self, current: Duration) -> Duration {
        let next = current.as_secs_f64() * self.multiplier;
        Duration::try_from_secs_f64(next)
            .ok()
            .filter(|d| *d < self.max_interval)
            .unwrap_or(self.max_interval)
    }

    /// Sample a jittered wait around `base` using the thread-local RNG.
    pub fn randomize(&self, base: Duration) -> Duration {
        self.randomize_with(&mut rand::rng(), base)
    }

    /// Sample a jittered wait around `base` with the given RNG.
    ///
    /// The result lies in `[base * (1 - r), base * (1 + r)]`.
    pub fn randomize_with<R: Rng + ?Sized>(&self, rng: &mut R, base: Duration) -> Duration {
        let factor = self.randomization_factor.min(1.0);
        if !(factor > 0.0) || base.is_zero() {
            return base;
        }

        let nanos = base.as_nanos().min(u64::MAX as u128) as f64;
        let low = (nanos * (1.0 - factor)).ceil() as u64;
        let high = (nanos * (1.0 + factor)).floor() as u64;
        if low > high {
            return base;
        }

        Duration::from_nanos(rng.random_range(low..=high))
    }

    /// The wait that follows `current`: grown, capped, then jittered.
    pub fn next_interval(&self, current: Duration) -> Duration {
        self.randomize(self.grow(current))
    }

    /// Whether the elapsed-time budget has been spent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fleet_harness::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let bounded = RetryPolicy::exponential(Duration::from_millis(100))
    ///     .with_max_elapsed_time(Duration::from_secs(1));
    /// assert!(!bounded.is_exhausted(Duration::from_secs(1)));
    /// assert!(bounded.is_exhausted(Duration::from_millis(1001)));
    ///
    /// let unbounded = bounded.without_elapsed_limit();
    /// assert!(!unbounded.is_exhausted(Duration::from_secs(3600)));
    /// ```
    pub fn is_exhausted(&self, elapsed: Duration) -> bool {
        matches!(self.max_elapsed_time, Some(max) if elapsed > max)
    }

    /// Whether `attempts` calls (initial one included) use up `max_retries`.
    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        matches!(self.max_retries, Some(max) if attempts > max)
    }

    /// Check the policy invariants.
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.initial_interval.is_zero() {
            return Err(PolicyError::ZeroInitialInterval);
        }
        if !(self.multiplier > 1.0) || !self.multiplier.is_finite() {
            return Err(PolicyError::MultiplierTooSmall(self.multiplier));
        }
        if !(0.0..1.0).contains(&self.randomization_factor) {
            return Err(PolicyError::RandomizationOutOfRange(
                self.randomization_factor,
            ));
        }
        if self.max_interval < self.initial_interval {
            return Err(PolicyError::MaxIntervalBelowInitial {
                max_interval: self.max_interval,
                initial_interval: self.initial_interval,
            });
        }
        if let Some(budget) = self.max_elapsed_time {
            if budget < self.initial_interval {
                return Err(PolicyError::ElapsedBudgetBelowInitial {
                    max_elapsed_time: budget,
                    initial_interval: self.initial_interval,
                });
            }
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
            randomization_factor: DEFAULT_RANDOMIZATION_FACTOR,
            max_interval: DEFAULT_MAX_INTERVAL,
            max_elapsed_time: Some(DEFAULT_MAX_ELAPSED_TIME),
            max_retries: None,
        }
    }
}
