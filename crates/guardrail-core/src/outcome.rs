//! The result of one protected attempt, and how raw results are classified.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PolicyError;

/// Tagged result of a single attempt (or of a whole call once the policies
/// have finished with it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<T, E> {
    Success(T),
    /// The operation failed in a way that may succeed if tried again.
    TransientFailure(E),
    /// The operation failed in a way that will not improve with retries.
    FatalFailure(E),
    /// The per-attempt time limit elapsed before the operation finished.
    TimedOut { after: Duration },
    /// The circuit breaker refused the attempt.
    CircuitOpen,
    /// The bulkhead refused the call.
    BulkheadRejected,
    /// The caller cancelled the call.
    Cancelled,
}

/// Discriminant of an [`AttemptOutcome`], without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    TransientFailure,
    FatalFailure,
    TimedOut,
    CircuitOpen,
    BulkheadRejected,
    Cancelled,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::TransientFailure => "transient_failure",
            OutcomeKind::FatalFailure => "fatal_failure",
            OutcomeKind::TimedOut => "timed_out",
            OutcomeKind::CircuitOpen => "circuit_open",
            OutcomeKind::BulkheadRejected => "bulkhead_rejected",
            OutcomeKind::Cancelled => "cancelled",
        }
    }

    /// Whether an attempt ending this way is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OutcomeKind::TransientFailure | OutcomeKind::TimedOut)
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, OutcomeKind::Success)
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<T, E> AttemptOutcome<T, E> {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            AttemptOutcome::Success(_) => OutcomeKind::Success,
            AttemptOutcome::TransientFailure(_) => OutcomeKind::TransientFailure,
            AttemptOutcome::FatalFailure(_) => OutcomeKind::FatalFailure,
            AttemptOutcome::TimedOut { .. } => OutcomeKind::TimedOut,
            AttemptOutcome::CircuitOpen => OutcomeKind::CircuitOpen,
            AttemptOutcome::BulkheadRejected => OutcomeKind::BulkheadRejected,
            AttemptOutcome::Cancelled => OutcomeKind::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success(_))
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Returns the success value, if any.
    pub fn success(self) -> Option<T> {
        match self {
            AttemptOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F>(self, f: F) -> AttemptOutcome<U, E>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            AttemptOutcome::Success(value) => AttemptOutcome::Success(f(value)),
            AttemptOutcome::TransientFailure(e) => AttemptOutcome::TransientFailure(e),
            AttemptOutcome::FatalFailure(e) => AttemptOutcome::FatalFailure(e),
            AttemptOutcome::TimedOut { after } => AttemptOutcome::TimedOut { after },
            AttemptOutcome::CircuitOpen => AttemptOutcome::CircuitOpen,
            AttemptOutcome::BulkheadRejected => AttemptOutcome::BulkheadRejected,
            AttemptOutcome::Cancelled => AttemptOutcome::Cancelled,
        }
    }

    /// Converts into a `Result`, attributing policy rejections to `target`.
    pub fn into_result(self, target: &str) -> Result<T, PolicyError<E>> {
        match self {
            AttemptOutcome::Success(value) => Ok(value),
            AttemptOutcome::TransientFailure(e) => Err(PolicyError::Transient(e)),
            AttemptOutcome::FatalFailure(e) => Err(PolicyError::Fatal(e)),
            AttemptOutcome::TimedOut { after } => Err(PolicyError::TimedOut { after }),
            AttemptOutcome::CircuitOpen => Err(PolicyError::CircuitOpen {
                target: target.to_string(),
            }),
            AttemptOutcome::BulkheadRejected => Err(PolicyError::BulkheadRejected {
                target: target.to_string(),
            }),
            AttemptOutcome::Cancelled => Err(PolicyError::Cancelled),
        }
    }
}

/// Whether an operation error may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Fatal,
}

/// Maps the raw result of an operation onto an [`AttemptOutcome`].
pub trait OutcomeClassifier<T, E>: Send + Sync {
    fn classify(&self, result: Result<T, E>) -> AttemptOutcome<T, E>;
}

/// Treats every error as transient.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<T, E> OutcomeClassifier<T, E> for DefaultClassifier {
    fn classify(&self, result: Result<T, E>) -> AttemptOutcome<T, E> {
        match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(e) => AttemptOutcome::TransientFailure(e),
        }
    }
}

/// Classifies errors with a predicate.
///
/// ```
/// use guardrail_core::{ErrorClass, FnClassifier, OutcomeClassifier};
///
/// let classifier = FnClassifier::new(|status: &u16| {
///     if *status >= 500 { ErrorClass::Transient } else { ErrorClass::Fatal }
/// });
/// assert!(classifier.classify(Err::<(), _>(503)).is_retryable());
/// assert!(!classifier.classify(Err::<(), _>(404)).is_retryable());
/// ```
pub struct FnClassifier<F> {
    f: Arc<F>,
}

impl<F> FnClassifier<F> {
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> Clone for FnClassifier<F> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<F> fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnClassifier").finish_non_exhaustive()
    }
}

impl<T, E, F> OutcomeClassifier<T, E> for FnClassifier<F>
where
    F: Fn(&E) -> ErrorClass + Send + Sync,
{
    fn classify(&self, result: Result<T, E>) -> AttemptOutcome<T, E> {
        match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(e) => match (self.f)(&e) {
                ErrorClass::Transient => AttemptOutcome::TransientFailure(e),
                ErrorClass::Fatal => AttemptOutcome::FatalFailure(e),
            },
        }
    }
}
