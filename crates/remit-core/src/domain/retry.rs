//! Retry policy: decides backoff delays for activity attempts.

use std::time::Duration;

/// Retry policy for failed activity attempts.
///
/// delay = min(initial_interval * backoff_coefficient^(attempts - 1), maximum_interval)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,

    /// Multiplier applied per attempt.
    pub backoff_coefficient: f64,

    /// Upper bound for a single delay.
    pub maximum_interval: Duration,

    /// Total attempts allowed, first attempt included. 0 means unlimited.
    pub maximum_attempts: u32,
}

impl RetryPolicy {
    /// Calculate delay for the next retry based on attempt number.
    ///
    /// `attempts` is the number of attempts already made (1-indexed).
    /// attempts=0 is treated like the first failure.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        if !secs.is_finite() || secs >= self.maximum_interval.as_secs_f64() {
            return self.maximum_interval;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Whether another attempt may follow `attempts` completed attempts.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.maximum_attempts == 0 || attempts < self.maximum_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(100),
            maximum_attempts: 0,
        }
    }
}

/// Per-invocation options for an activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    /// How long one attempt may run before it counts as failed.
    pub start_to_close_timeout: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            start_to_close_timeout: Duration::from_secs(60),
            retry_policy: RetryPolicy::default(),
        }
    }
}
