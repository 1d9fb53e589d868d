use guardrail_core::PolicyError;
use thiserror::Error;

/// Errors returned by [`CircuitBreakerService`](crate::CircuitBreakerService).
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call never reached the inner service.
    #[error("circuit '{target}' is open; call not permitted")]
    OpenCircuit { target: String },

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit { .. })
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::OpenCircuit { .. } => None,
        }
    }
}

impl<E> From<CircuitBreakerError<E>> for PolicyError<E> {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::OpenCircuit { target } => PolicyError::CircuitOpen { target },
            CircuitBreakerError::Inner(e) => PolicyError::Transient(e),
        }
    }
}
