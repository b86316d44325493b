//! Exponential backoff policy for re-establishing the notification subscription.

use std::time::Duration;

/// Exponential backoff retry policy.
///
/// Delays grow as `base_delay * 2^attempt`, capped at `max_delay`. When
/// `max_attempts` is set, `delay_for` returns `None` once that many
/// consecutive attempts have been made.
#[derive(Clone, Debug, PartialEq)]
pub struct Backoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
}

impl Backoff {
    /// Create a policy with unbounded attempts.
    ///
    /// # Arguments
    ///
    /// * `base_delay` - Delay before the first reconnect attempt
    /// * `max_delay` - Upper bound on any single delay
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Delay to wait before attempt number `attempt` (zero based), or `None`
    /// when the policy gives up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt >= max => None,
            _ => Some(self.exponential_delay(attempt)),
        }
    }

    /// Calculate exponential backoff delay.
    fn exponential_delay(&self, n_attempts: u32) -> Duration {
        let exponent = n_attempts.min(i32::MAX as u32) as i32;
        let delay = self.base_delay.as_secs_f64() * 2_f64.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(60))
    }
}
