//! Retry policy for failed publishes.

use std::time::Duration;

/// Bounded exponential backoff.
///
/// After the n-th failed attempt the message waits
/// `min(base_delay * 2^(n-1), max_delay)`. Once `max_attempts` attempts have
/// failed the message is dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Fails on the first publish error.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the next attempt, or None to give up.
    ///
    /// `attempts` is the number of attempts made so far, including the one
    /// that just failed.
    pub fn next_delay(&self, attempts: u32) -> Option<Duration> {
        if attempts >= self.max_attempts {
            return None;
        }
        let exponent = attempts.saturating_sub(1);
        let factor = 2u32.saturating_pow(exponent);
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}
