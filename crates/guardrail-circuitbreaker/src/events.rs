use crate::circuit::CircuitState;
use guardrail_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by a [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit moved between states.
    StateTransition {
        target: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was admitted. `probe` is set for the single half-open trial.
    CallPermitted {
        target: String,
        timestamp: Instant,
        state: CircuitState,
        probe: bool,
    },
    /// A call was refused because the circuit is open or a probe is already
    /// in flight.
    CallRejected {
        target: String,
        timestamp: Instant,
        state: CircuitState,
    },
    SuccessRecorded {
        target: String,
        timestamp: Instant,
        state: CircuitState,
    },
    FailureRecorded {
        target: String,
        timestamp: Instant,
        state: CircuitState,
        consecutive_failures: u32,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn target(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { target, .. }
            | CircuitBreakerEvent::CallPermitted { target, .. }
            | CircuitBreakerEvent::CallRejected { target, .. }
            | CircuitBreakerEvent::SuccessRecorded { target, .. }
            | CircuitBreakerEvent::FailureRecorded { target, .. } => target,
        }
    }
}
