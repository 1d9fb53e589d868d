use guardrail_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a [`Bulkhead`](crate::Bulkhead).
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call took a slot. `waited` is zero unless it queued first.
    CallPermitted {
        target: String,
        timestamp: Instant,
        active: usize,
        waited: Duration,
    },
    /// No slot was free; the call joined the wait queue.
    CallQueued {
        target: String,
        timestamp: Instant,
        queued: usize,
    },
    /// No slot and no queue room.
    CallRejected {
        target: String,
        timestamp: Instant,
        max_concurrent: usize,
        max_queued: usize,
    },
    /// A slot was handed back.
    CallReleased {
        target: String,
        timestamp: Instant,
        held: Duration,
    },
    /// A queued caller gave up before getting a slot.
    WaitCancelled {
        target: String,
        timestamp: Instant,
        waited: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallQueued { .. } => "call_queued",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallReleased { .. } => "call_released",
            BulkheadEvent::WaitCancelled { .. } => "wait_cancelled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallQueued { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::CallReleased { timestamp, .. }
            | BulkheadEvent::WaitCancelled { timestamp, .. } => *timestamp,
        }
    }

    fn target(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { target, .. }
            | BulkheadEvent::CallQueued { target, .. }
            | BulkheadEvent::CallRejected { target, .. }
            | BulkheadEvent::CallReleased { target, .. }
            | BulkheadEvent::WaitCancelled { target, .. } => target,
        }
    }
}
