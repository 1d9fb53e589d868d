//! Error types for the bulkhead.

use guardrail_core::PolicyError;

/// Why a call was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError {
    /// Every slot is taken and the wait queue is full.
    #[error("bulkhead '{name}' is full: {max_concurrent} running, {max_queued} queued")]
    Rejected {
        name: String,
        max_concurrent: usize,
        max_queued: usize,
    },
    /// The caller cancelled while waiting in the queue.
    #[error("cancelled while waiting for a bulkhead slot")]
    Cancelled,
}

impl BulkheadError {
    pub fn is_rejected(&self) -> bool {
        matches!(self, BulkheadError::Rejected { .. })
    }
}

impl<E> From<BulkheadError> for PolicyError<E> {
    fn from(err: BulkheadError) -> Self {
        match err {
            BulkheadError::Rejected { name, .. } => PolicyError::BulkheadRejected { target: name },
            BulkheadError::Cancelled => PolicyError::Cancelled,
        }
    }
}
