use crate::backoff::{ExponentialBackoff, IntervalFunction};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How many attempts to make and how long to wait between them.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Arc<dyn IntervalFunction>,
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt, so 4 means up to 3 retries.
    pub fn new(max_attempts: u32, interval: Arc<dyn IntervalFunction>) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after attempt `attempt` has failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.interval.next_interval(attempt)
    }
}

impl Default for RetryPolicy {
    /// 4 attempts with 2s, 4s and 8s between them.
    fn default() -> Self {
        Self::new(4, Arc::new(ExponentialBackoff::new(Duration::from_secs(1))))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
