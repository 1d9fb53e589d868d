use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed = 0,
    /// Calls are refused until the open duration has elapsed.
    Open = 1,
    /// A single probe call decides whether to close or reopen.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Result of asking the circuit for permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Permitted { generation: u64, probe: bool },
    Rejected,
}

/// The breaker's state machine. Callers hold the surrounding lock.
///
/// `generation` is bumped on every transition. Outcomes reported through a
/// permit carry the generation they were issued in, and outcomes from an
/// older generation are ignored, so a slow call admitted while Closed cannot
/// move a circuit that has since opened.
pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    generation: u64,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
            generation: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig, now: Instant) -> Admission {
        if self.state == CircuitState::Open {
            let cooled_down = self
                .opened_at
                .map(|opened| now.saturating_duration_since(opened) >= config.open_duration)
                .unwrap_or(true);
            if cooled_down {
                self.transition_to(CircuitState::HalfOpen, config, now);
            }
        }

        let admission = match self.state {
            CircuitState::Closed => Admission::Permitted {
                generation: self.generation,
                probe: false,
            },
            CircuitState::HalfOpen if !self.probe_in_flight => {
                self.probe_in_flight = true;
                Admission::Permitted {
                    generation: self.generation,
                    probe: true,
                }
            }
            CircuitState::HalfOpen | CircuitState::Open => Admission::Rejected,
        };

        match admission {
            Admission::Permitted { probe, .. } => {
                config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallPermitted {
                        target: config.name.clone(),
                        timestamp: now,
                        state: self.state,
                        probe,
                    });
                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "permitted").increment(1);
            }
            Admission::Rejected => {
                config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallRejected {
                        target: config.name.clone(),
                        timestamp: now,
                        state: self.state,
                    });
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %config.name, state = ?self.state, "call rejected");
                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);
            }
        }
        admission
    }

    /// Success reported without a permit.
    pub(crate) fn record_success(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.emit_success(config, now);
            }
            CircuitState::HalfOpen => {
                self.emit_success(config, now);
                self.transition_to(CircuitState::Closed, config, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Failure reported without a permit.
    pub(crate) fn record_failure(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.emit_failure(config, now);
                if self.consecutive_failures >= config.failure_threshold {
                    self.transition_to(CircuitState::Open, config, now);
                }
            }
            CircuitState::HalfOpen => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.emit_failure(config, now);
                self.transition_to(CircuitState::Open, config, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Success reported through a permit issued in `generation`.
    pub(crate) fn on_success(&mut self, config: &CircuitBreakerConfig, now: Instant, generation: u64) {
        if generation == self.generation {
            self.record_success(config, now);
        }
    }

    /// Failure reported through a permit issued in `generation`.
    pub(crate) fn on_failure(&mut self, config: &CircuitBreakerConfig, now: Instant, generation: u64) {
        if generation == self.generation {
            self.record_failure(config, now);
        }
    }

    /// A probe permit was dropped without an outcome; let another call probe.
    pub(crate) fn release_probe(&mut self, generation: u64) {
        if generation == self.generation && self.state == CircuitState::HalfOpen {
            self.probe_in_flight = false;
        }
    }

    pub(crate) fn force_open(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        self.transition_to(CircuitState::Open, config, now);
    }

    pub(crate) fn reset(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        self.transition_to(CircuitState::Closed, config, now);
        self.consecutive_failures = 0;
    }

    fn emit_success(&self, config: &CircuitBreakerConfig, now: Instant) {
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                target: config.name.clone(),
                timestamp: now,
                state: self.state,
            });
        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_outcomes_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);
    }

    fn emit_failure(&self, config: &CircuitBreakerConfig, now: Instant) {
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                target: config.name.clone(),
                timestamp: now,
                state: self.state,
                consecutive_failures: self.consecutive_failures,
            });
        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_outcomes_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig, now: Instant) {
        let from_state = self.state;
        // Reopening from Open still restarts the open period.
        if from_state == state && state != CircuitState::Open {
            return;
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.generation = self.generation.wrapping_add(1);
        self.probe_in_flight = false;
        match state {
            CircuitState::Open => self.opened_at = Some(now),
            CircuitState::Closed => {
                self.opened_at = None;
                self.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {}
        }

        if from_state == state {
            return;
        }

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                target: config.name.clone(),
                timestamp: now,
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        {
            if state == CircuitState::Open {
                tracing::warn!(
                    breaker = %config.name,
                    from = ?from_state,
                    consecutive_failures = self.consecutive_failures,
                    open_for = ?config.open_duration,
                    "circuit opened"
                );
            } else {
                tracing::info!(breaker = %config.name, from = ?from_state, to = ?state, "circuit state transition");
            }
        }

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(f64::from(state as u8));
        }
    }
}
