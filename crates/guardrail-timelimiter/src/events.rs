use guardrail_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a [`TimeoutGuard`](crate::TimeoutGuard).
#[derive(Debug, Clone)]
pub enum TimeLimiterEvent {
    /// The attempt finished within its time limit.
    Completed {
        target: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// The time limit elapsed; the attempt was signalled and dropped.
    Timeout {
        target: String,
        timestamp: Instant,
        timeout: Duration,
    },
    /// The caller cancelled before the attempt finished.
    Cancelled {
        target: String,
        timestamp: Instant,
        duration: Duration,
    },
}

impl ResilienceEvent for TimeLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TimeLimiterEvent::Completed { .. } => "completed",
            TimeLimiterEvent::Timeout { .. } => "timeout",
            TimeLimiterEvent::Cancelled { .. } => "cancelled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TimeLimiterEvent::Completed { timestamp, .. }
            | TimeLimiterEvent::Timeout { timestamp, .. }
            | TimeLimiterEvent::Cancelled { timestamp, .. } => *timestamp,
        }
    }

    fn target(&self) -> &str {
        match self {
            TimeLimiterEvent::Completed { target, .. }
            | TimeLimiterEvent::Timeout { target, .. }
            | TimeLimiterEvent::Cancelled { target, .. } => target,
        }
    }
}
