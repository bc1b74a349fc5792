//! Retry parameters for the connection lifecycle.

use std::time::Duration;

/// Retry policy for `connect`.
///
/// Transient failures are retried every `retry_delay` until `timeout`
/// elapses. The defaults (5 s budget, 1 s fixed delay) have no documented
/// derivation; they are plain configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wall-clock budget for one `connect` call, retries included.
    pub timeout: Duration,
    /// Fixed delay between a failed attempt and the next one.
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Set the overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the delay between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            retry_delay: Duration::from_millis(1000),
        }
    }
}
