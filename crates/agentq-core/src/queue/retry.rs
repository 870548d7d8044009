//! Retry policy: decides a failed task's fate and its backoff delay.

use std::time::Duration;

/// What happens to a task after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue; the task becomes eligible for re-assignment after the
    /// given backoff delay.
    Retry(Duration),

    /// Retry budget exhausted; the task goes terminally FAILED.
    Terminal,
}

/// Exponential backoff with a fixed ceiling.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier per additional retry.
    pub multiplier: f64,

    /// Ceiling on the computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Delay applied for retry number `retry_count` (1-indexed):
    /// `base_delay * multiplier^(retry_count - 1)`, capped at `max_delay`.
    ///
    /// With base=2s, multiplier=2.0: retry 1 waits 2s, retry 2 waits 4s,
    /// retry 3 waits 8s, and so on up to the ceiling.
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(retry_count.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs).min(self.max_delay)
    }

    /// Decide the fate of a task whose current counter is `retry_count` out
    /// of `max_retries`. A failure that would push the counter past the
    /// budget is terminal instead.
    pub fn decide(&self, retry_count: u32, max_retries: u32) -> RetryDecision {
        if retry_count < max_retries {
            RetryDecision::Retry(self.next_delay(retry_count + 1))
        } else {
            RetryDecision::Terminal
        }
    }
}
