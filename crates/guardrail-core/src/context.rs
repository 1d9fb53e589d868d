//! Per-call and per-attempt context handed down the policy chain.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// What an operation (or a policy stage) knows about the attempt it is
/// running.
///
/// The cancellation token is the one the operation should watch. Policies
/// that bound an attempt, such as the timeout guard, hand the operation a
/// child token and cancel it when they give up on the attempt.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    target: Arc<str>,
    attempt: u32,
    cancel: CancellationToken,
}

impl AttemptContext {
    /// Context for a call that has not started any attempt yet.
    pub fn new(target: impl Into<Arc<str>>, cancel: CancellationToken) -> Self {
        Self {
            target: target.into(),
            attempt: 0,
            cancel,
        }
    }

    /// Name of the protected dependency.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// 1-based attempt number, or 0 before the first attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn with_attempt(&self, attempt: u32) -> Self {
        Self {
            target: Arc::clone(&self.target),
            attempt,
            cancel: self.cancel.clone(),
        }
    }

    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            target: Arc::clone(&self.target),
            attempt: self.attempt,
            cancel,
        }
    }
}
