//! Consecutive-failure circuit breaker.
//!
//! A [`CircuitBreaker`] guards one logical target. It is a cheap, cloneable
//! handle; every clone shares the same state, so build one per dependency
//! and hand clones to whoever calls it.
//!
//! ## States
//!
//! - **Closed**: calls are admitted. Each failure bumps a consecutive
//!   failure counter and any success resets it. Reaching
//!   `failure_threshold` opens the circuit.
//! - **Open**: calls are refused until `open_duration` has elapsed on the
//!   breaker's clock.
//! - **HalfOpen**: exactly one probe call is admitted. Its success closes
//!   the circuit; its failure reopens it for another `open_duration`.
//!
//! ## Recording outcomes
//!
//! There are two ways to feed the breaker:
//!
//! - [`allow`](CircuitBreaker::allow) followed by
//!   [`record_success`](CircuitBreaker::record_success) or
//!   [`record_failure`](CircuitBreaker::record_failure);
//! - [`try_acquire`](CircuitBreaker::try_acquire), which returns a
//!   [`BreakerPermit`]. Outcomes reported through a permit only count while
//!   the circuit is still in the state that issued it, and dropping an
//!   unreported probe permit lets the next caller probe instead.
//!
//! ```rust
//! use guardrail_circuitbreaker::{CircuitBreaker, CircuitState};
//! use guardrail_core::ManualClock;
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let breaker = CircuitBreaker::builder()
//!     .name("users-api")
//!     .failure_threshold(3)
//!     .open_duration(Duration::from_secs(30))
//!     .clock(clock.clone())
//!     .build()
//!     .unwrap();
//!
//! for _ in 0..3 {
//!     assert!(breaker.allow());
//!     breaker.record_failure();
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//! assert!(!breaker.allow());
//!
//! clock.advance(Duration::from_secs(30));
//! let probe = breaker.try_acquire().expect("probe admitted");
//! assert!(probe.is_probe());
//! probe.success();
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! ```
//!
//! ## Tower
//!
//! [`CircuitBreaker::layer`] wraps any `tower::Service`, treating every
//! inner error as a failure.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use circuit::CircuitState;
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};

use circuit::{Admission, Circuit};

mod circuit;
mod config;
mod error;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// Shared circuit breaker handle.
#[derive(Clone)]
pub struct CircuitBreaker {
    circuit: Arc<Mutex<Circuit>>,
    state: Arc<AtomicU8>,
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreaker {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            metrics::describe_counter!(
                "circuitbreaker_calls_total",
                "Calls permitted or rejected by the circuit breaker"
            );
            metrics::describe_counter!(
                "circuitbreaker_outcomes_total",
                "Successes and failures recorded by the circuit breaker"
            );
            metrics::describe_counter!(
                "circuitbreaker_transitions_total",
                "Circuit breaker state transitions"
            );
            metrics::describe_gauge!(
                "circuitbreaker_state",
                "Current state (0 = closed, 1 = open, 2 = half-open)"
            );
        });
        CircuitBreakerConfigBuilder::new()
    }

    pub(crate) fn new(config: CircuitBreakerConfig) -> Self {
        let state = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            circuit: Arc::new(Mutex::new(Circuit::new(Arc::clone(&state)))),
            state,
            config: Arc::new(config),
        }
    }

    fn circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Asks for permission to make a call.
    ///
    /// In HalfOpen this claims the single probe slot, which stays claimed
    /// until an outcome is recorded. Prefer [`try_acquire`](Self::try_acquire)
    /// when the caller may abandon the call.
    pub fn allow(&self) -> bool {
        match self.try_acquire() {
            Some(permit) => {
                permit.forget();
                true
            }
            None => false,
        }
    }

    /// Asks for permission and returns a permit to report the outcome on.
    pub fn try_acquire(&self) -> Option<BreakerPermit> {
        let now = self.config.clock.now();
        match self.circuit().try_acquire(&self.config, now) {
            Admission::Permitted { generation, probe } => Some(BreakerPermit {
                breaker: self.clone(),
                generation,
                probe,
                settled: false,
            }),
            Admission::Rejected => None,
        }
    }

    pub fn record_success(&self) {
        let now = self.config.clock.now();
        self.circuit().record_success(&self.config, now);
    }

    pub fn record_failure(&self) {
        let now = self.config.clock.now();
        self.circuit().record_failure(&self.config, now);
    }

    /// Current state, read without taking the lock.
    ///
    /// An Open circuit whose open duration has elapsed still reports Open
    /// until the next call asks for permission.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.circuit().consecutive_failures()
    }

    /// Opens the circuit now, starting a fresh open period.
    pub fn force_open(&self) {
        let now = self.config.clock.now();
        self.circuit().force_open(&self.config, now);
    }

    /// Closes the circuit and clears the failure streak.
    pub fn reset(&self) {
        let now = self.config.clock.now();
        self.circuit().reset(&self.config, now);
    }

    /// A tower layer that routes calls through this breaker.
    pub fn layer(&self) -> CircuitBreakerLayer {
        CircuitBreakerLayer::new(self.clone())
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Permission to make one call.
///
/// Report the outcome with [`success`](Self::success) or
/// [`failure`](Self::failure). Dropping the permit without reporting records
/// nothing; for a probe it frees the half-open slot.
#[must_use = "dropping a permit records nothing"]
pub struct BreakerPermit {
    breaker: CircuitBreaker,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl BreakerPermit {
    /// Whether this permit is the half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(mut self) {
        self.settled = true;
        let now = self.breaker.config.clock.now();
        self.breaker
            .circuit()
            .on_success(&self.breaker.config, now, self.generation);
    }

    pub fn failure(mut self) {
        self.settled = true;
        let now = self.breaker.config.clock.now();
        self.breaker
            .circuit()
            .on_failure(&self.breaker.config, now, self.generation);
    }

    /// Gives up the permit without recording an outcome.
    pub fn release(self) {}

    /// Detaches the permit; a claimed probe slot stays claimed.
    fn forget(mut self) {
        self.settled = true;
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.circuit().release_probe(self.generation);
        }
    }
}

impl fmt::Debug for BreakerPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerPermit")
            .field("breaker", &self.breaker.name())
            .field("probe", &self.probe)
            .finish()
    }
}
