use guardrail_core::PolicyError;
use std::time::Duration;
use thiserror::Error;

/// Why [`TimeoutGuard::call`](crate::TimeoutGuard::call) gave up on a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeLimiterError {
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("cancelled before completion")]
    Cancelled,
}

impl<E> From<TimeLimiterError> for PolicyError<E> {
    fn from(err: TimeLimiterError) -> Self {
        match err {
            TimeLimiterError::Timeout { after } => PolicyError::TimedOut { after },
            TimeLimiterError::Cancelled => PolicyError::Cancelled,
        }
    }
}
