use guardrail_core::{OutcomeKind, ResilienceEvent};
use std::time::{Duration, Instant};

/// Events emitted by a [`RetryOrchestrator`](crate::RetryOrchestrator).
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// Attempt `attempt` failed with `reason`; the next attempt starts after
    /// `delay`.
    Retry {
        target: String,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
        reason: OutcomeKind,
    },
    /// Attempt `attempt` ran past its time limit.
    TimedOut {
        target: String,
        timestamp: Instant,
        attempt: u32,
        after: Duration,
    },
    /// The call succeeded on attempt `attempts`.
    Success {
        target: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// Every attempt failed.
    Exhausted {
        target: String,
        timestamp: Instant,
        attempts: u32,
        last: OutcomeKind,
    },
    /// The attempt failed in a way that is never retried.
    NonRetryable {
        target: String,
        timestamp: Instant,
        attempt: u32,
        kind: OutcomeKind,
    },
    /// The circuit breaker refused attempt `attempt`.
    CircuitOpen {
        target: String,
        timestamp: Instant,
        attempt: u32,
    },
    /// The caller cancelled during attempt `attempt` or the wait after it.
    Cancelled {
        target: String,
        timestamp: Instant,
        attempt: u32,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::TimedOut { .. } => "timed_out",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::NonRetryable { .. } => "non_retryable",
            RetryEvent::CircuitOpen { .. } => "circuit_open",
            RetryEvent::Cancelled { .. } => "cancelled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::TimedOut { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::NonRetryable { timestamp, .. }
            | RetryEvent::CircuitOpen { timestamp, .. }
            | RetryEvent::Cancelled { timestamp, .. } => *timestamp,
        }
    }

    fn target(&self) -> &str {
        match self {
            RetryEvent::Retry { target, .. }
            | RetryEvent::TimedOut { target, .. }
            | RetryEvent::Success { target, .. }
            | RetryEvent::Exhausted { target, .. }
            | RetryEvent::NonRetryable { target, .. }
            | RetryEvent::CircuitOpen { target, .. }
            | RetryEvent::Cancelled { target, .. } => target,
        }
    }
}
