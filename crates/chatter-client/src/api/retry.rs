//! Retry budget and exponential backoff.
//!
//! The delay before retry k (1-based) is exactly `base_delay * 2^(k-1)`.
//! No jitter and no cap: the whole configuration surface is the retry count
//! and the base delay, and callers that need smaller backoff windows shrink
//! the base.

use std::time::Duration;

/// Retry behavior for one logical call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first (0 = fail on the first error).
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Backoff to sleep after the attempt with the given zero-based index
    /// fails.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}
