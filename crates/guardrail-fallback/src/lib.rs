//! Fallback resolution for failed calls.
//!
//! A [`FallbackResolver`] looks at the final outcome of a call. Successes
//! pass through; failures, timeouts and policy rejections are replaced by a
//! designated value. The substitution is always visible to the caller as
//! [`Resolved::Fallback`], together with the kind of failure that caused it.
//!
//! ```rust
//! use guardrail_core::{AttemptOutcome, OutcomeKind};
//! use guardrail_fallback::{FallbackResolver, Resolved};
//!
//! let fallback = FallbackResolver::builder()
//!     .name("users-api")
//!     .value("anonymous")
//!     .build()
//!     .unwrap();
//!
//! let ok = fallback.resolve(AttemptOutcome::<_, ()>::Success("alice"));
//! assert_eq!(ok, Ok(Resolved::Success("alice")));
//!
//! let degraded = fallback.resolve(AttemptOutcome::<&str, ()>::CircuitOpen);
//! assert_eq!(
//!     degraded,
//!     Ok(Resolved::Fallback { value: "anonymous", cause: OutcomeKind::CircuitOpen })
//! );
//! ```
//!
//! Eligibility can be narrowed with [`FallbackConfigBuilder::handle`]; a
//! failure the predicate rejects comes back as `Err(outcome)` so the caller
//! can surface it.

use std::fmt;
use std::sync::Arc;

use guardrail_core::{AttemptOutcome, OutcomeKind};
#[cfg(feature = "metrics")]
use metrics::counter;

pub use config::{FallbackConfig, FallbackConfigBuilder};
pub use events::FallbackEvent;

mod config;
mod events;

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// A call result after fallback resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    /// The operation itself succeeded.
    Success(T),
    /// The operation did not succeed; `value` is the designated substitute.
    Fallback { value: T, cause: OutcomeKind },
}

impl<T> Resolved<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolved::Fallback { .. })
    }

    /// Kind of failure that triggered the fallback, if one was applied.
    pub fn cause(&self) -> Option<OutcomeKind> {
        match self {
            Resolved::Success(_) => None,
            Resolved::Fallback { cause, .. } => Some(*cause),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Resolved::Success(value) | Resolved::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Resolved::Success(value) | Resolved::Fallback { value, .. } => value,
        }
    }

    pub fn map<U, F>(self, f: F) -> Resolved<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Resolved::Success(value) => Resolved::Success(f(value)),
            Resolved::Fallback { value, cause } => Resolved::Fallback {
                value: f(value),
                cause,
            },
        }
    }
}

/// Substitutes a designated value for failed calls.
pub struct FallbackResolver<T> {
    config: Arc<FallbackConfig<T>>,
}

impl<T> FallbackResolver<T> {
    pub fn builder() -> FallbackConfigBuilder<T> {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            metrics::describe_counter!(
                "fallback_calls_total",
                "Calls seen by the fallback resolver, by result"
            );
        });
        FallbackConfigBuilder::new()
    }

    pub(crate) fn new(config: FallbackConfig<T>) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &FallbackConfig<T> {
        &self.config
    }

    /// Resolves the final outcome of a call.
    ///
    /// Returns `Err(outcome)` only when the handle predicate excludes the
    /// failure kind.
    pub fn resolve<E>(
        &self,
        outcome: AttemptOutcome<T, E>,
    ) -> Result<Resolved<T>, AttemptOutcome<T, E>> {
        let config = &*self.config;
        let cause = outcome.kind();
        if let AttemptOutcome::Success(value) = outcome {
            config.event_listeners.emit(&FallbackEvent::Passthrough {
                target: config.name.clone(),
                timestamp: config.clock.now(),
            });
            #[cfg(feature = "metrics")]
            counter!("fallback_calls_total", "fallback" => config.name.clone(), "result" => "passthrough").increment(1);
            return Ok(Resolved::Success(value));
        }

        if !config.handles(cause) {
            config.event_listeners.emit(&FallbackEvent::Skipped {
                target: config.name.clone(),
                timestamp: config.clock.now(),
                cause,
            });
            #[cfg(feature = "tracing")]
            tracing::debug!(fallback = %config.name, %cause, "failure not eligible for fallback");
            #[cfg(feature = "metrics")]
            counter!("fallback_calls_total", "fallback" => config.name.clone(), "result" => "skipped").increment(1);
            return Err(outcome);
        }

        let value = (config.value_fn)(cause);
        config.event_listeners.emit(&FallbackEvent::Applied {
            target: config.name.clone(),
            timestamp: config.clock.now(),
            cause,
        });
        #[cfg(feature = "tracing")]
        tracing::info!(fallback = %config.name, %cause, strategy = config.strategy, "fallback applied");
        #[cfg(feature = "metrics")]
        counter!("fallback_calls_total", "fallback" => config.name.clone(), "result" => "applied", "cause" => cause.as_str()).increment(1);
        Ok(Resolved::Fallback { value, cause })
    }
}

impl<T> Clone for FallbackResolver<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<T> fmt::Debug for FallbackResolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackResolver")
            .field("name", &self.config.name)
            .field("strategy", &self.config.strategy)
            .field("filtered", &self.config.handle.is_some())
            .finish()
    }
}
