//! Error types shared across guardrail policies.
//!
//! [`PolicyError<E>`] is what a pipeline returns in strict mode (or when no
//! fallback applies). It keeps the operation's own error in the `Transient`
//! and `Fatal` variants and describes every policy decision in the others,
//! so callers can match on it without writing `From` glue per layer:
//!
//! ```rust
//! use guardrail_core::PolicyError;
//! use std::time::Duration;
//!
//! fn describe(error: &PolicyError<std::io::Error>) -> String {
//!     match error {
//!         PolicyError::TimedOut { after } => format!("gave up after {after:?}"),
//!         PolicyError::CircuitOpen { target } => format!("{target} is unavailable"),
//!         PolicyError::BulkheadRejected { target } => format!("{target} is saturated"),
//!         PolicyError::Cancelled => "cancelled".to_string(),
//!         PolicyError::Transient(e) | PolicyError::Fatal(e) => e.to_string(),
//!     }
//! }
//!
//! let error = PolicyError::<std::io::Error>::TimedOut { after: Duration::from_secs(10) };
//! assert!(error.is_timeout());
//! assert_eq!(describe(&error), "gave up after 10s");
//! ```

use std::time::Duration;

use crate::outcome::OutcomeKind;

/// Terminal failure of a protected call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError<E> {
    /// The last attempt failed with a retryable error and no attempts remain.
    #[error("operation failed: {0}")]
    Transient(E),

    /// The operation failed with an error that is never retried.
    #[error("operation failed permanently: {0}")]
    Fatal(E),

    /// The last attempt exceeded its time limit.
    #[error("attempt timed out after {after:?}")]
    TimedOut { after: Duration },

    /// The circuit breaker for `target` is refusing calls.
    #[error("circuit breaker for '{target}' is open")]
    CircuitOpen { target: String },

    /// The bulkhead for `target` had no free slot and no queue room.
    #[error("bulkhead for '{target}' is full")]
    BulkheadRejected { target: String },

    /// The caller cancelled the call.
    #[error("call was cancelled")]
    Cancelled,
}

impl<E> PolicyError<E> {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            PolicyError::Transient(_) => OutcomeKind::TransientFailure,
            PolicyError::Fatal(_) => OutcomeKind::FatalFailure,
            PolicyError::TimedOut { .. } => OutcomeKind::TimedOut,
            PolicyError::CircuitOpen { .. } => OutcomeKind::CircuitOpen,
            PolicyError::BulkheadRejected { .. } => OutcomeKind::BulkheadRejected,
            PolicyError::Cancelled => OutcomeKind::Cancelled,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PolicyError::TimedOut { .. })
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PolicyError::CircuitOpen { .. })
    }

    pub fn is_bulkhead_rejected(&self) -> bool {
        matches!(self, PolicyError::BulkheadRejected { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PolicyError::Cancelled)
    }

    /// True when the error came from the operation rather than a policy.
    pub fn is_operation_error(&self) -> bool {
        matches!(self, PolicyError::Transient(_) | PolicyError::Fatal(_))
    }

    /// Borrows the operation's error, if this is one.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            PolicyError::Transient(e) | PolicyError::Fatal(e) => Some(e),
            _ => None,
        }
    }

    /// Takes the operation's error, if this is one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            PolicyError::Transient(e) | PolicyError::Fatal(e) => Some(e),
            _ => None,
        }
    }

    pub fn map_err<F, O>(self, f: F) -> PolicyError<O>
    where
        F: FnOnce(E) -> O,
    {
        match self {
            PolicyError::Transient(e) => PolicyError::Transient(f(e)),
            PolicyError::Fatal(e) => PolicyError::Fatal(f(e)),
            PolicyError::TimedOut { after } => PolicyError::TimedOut { after },
            PolicyError::CircuitOpen { target } => PolicyError::CircuitOpen { target },
            PolicyError::BulkheadRejected { target } => PolicyError::BulkheadRejected { target },
            PolicyError::Cancelled => PolicyError::Cancelled,
        }
    }
}

/// Rejected builder input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: usize },

    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
