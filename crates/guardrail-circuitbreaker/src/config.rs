use crate::circuit::CircuitState;
use crate::events::CircuitBreakerEvent;
use crate::CircuitBreaker;
use guardrail_core::{default_clock, Clock, ConfigError, EventListeners, FnListener, SharedClock};
use std::sync::Arc;
use std::time::Duration;

/// Settings for a [`CircuitBreaker`].
pub struct CircuitBreakerConfig {
    pub(crate) failure_threshold: u32,
    pub(crate) open_duration: Duration,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) clock: SharedClock,
}

impl CircuitBreakerConfig {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for a [`CircuitBreaker`].
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: u32,
    open_duration: Duration,
    name: String,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    clock: SharedClock,
}

impl CircuitBreakerConfigBuilder {
    /// Defaults: open after 3 consecutive failures, stay open for 30 seconds.
    pub fn new() -> Self {
        Self {
            failure_threshold: 3,
            open_duration: Duration::from_secs(30),
            name: String::from("<unnamed>"),
            event_listeners: EventListeners::new(),
            clock: default_clock(),
        }
    }

    /// Consecutive failures that open the circuit.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// How long the circuit stays open before admitting a probe.
    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.open_duration = duration;
        self
    }

    /// Name used in events, logs and metric labels.
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Uses `clock` for the open-duration check.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn shared_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a callback for state transitions, called with `(from, to)`.
    ///
    /// ```rust
    /// use guardrail_circuitbreaker::{CircuitBreaker, CircuitState};
    ///
    /// let breaker = CircuitBreaker::builder()
    ///     .failure_threshold(1)
    ///     .on_state_transition(|from, to| {
    ///         println!("circuit moved from {from:?} to {to:?}");
    ///     })
    ///     .build()
    ///     .unwrap();
    /// breaker.record_failure();
    /// assert_eq!(breaker.state(), CircuitState::Open);
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback for refused calls.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback for recorded failures, called with the current
    /// consecutive failure count.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded {
                    consecutive_failures,
                    ..
                } = event
                {
                    f(*consecutive_failures);
                }
            }));
        self
    }

    /// Registers a callback that sees every event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Builds the breaker, rejecting a zero threshold or open duration.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Zero {
                field: "failure_threshold",
            });
        }
        if self.open_duration.is_zero() {
            return Err(ConfigError::Zero {
                field: "open_duration",
            });
        }
        Ok(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            open_duration: self.open_duration,
            name: self.name,
            event_listeners: self.event_listeners,
            clock: self.clock,
        }))
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
