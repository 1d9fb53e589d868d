//! Events emitted by the fallback resolver.

use guardrail_core::{OutcomeKind, ResilienceEvent};
use std::time::Instant;

#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// The call succeeded; its value was passed through.
    Passthrough { target: String, timestamp: Instant },

    /// The call failed with `cause` and the designated value was returned.
    Applied {
        target: String,
        timestamp: Instant,
        cause: OutcomeKind,
    },

    /// The call failed with `cause`, which the handle predicate excludes.
    Skipped {
        target: String,
        timestamp: Instant,
        cause: OutcomeKind,
    },
}

impl ResilienceEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FallbackEvent::Passthrough { .. } => "passthrough",
            FallbackEvent::Applied { .. } => "applied",
            FallbackEvent::Skipped { .. } => "skipped",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            FallbackEvent::Passthrough { timestamp, .. }
            | FallbackEvent::Applied { timestamp, .. }
            | FallbackEvent::Skipped { timestamp, .. } => *timestamp,
        }
    }

    fn target(&self) -> &str {
        match self {
            FallbackEvent::Passthrough { target, .. }
            | FallbackEvent::Applied { target, .. }
            | FallbackEvent::Skipped { target, .. } => target,
        }
    }
}
