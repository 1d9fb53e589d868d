//! Pipeline-level observability.
//!
//! Each policy emits its own event type. A pipeline translates the ones an
//! operator cares about into a single [`PolicyEvent`] and hands it to every
//! registered observer. Decisions about one attempt (retries, timeouts,
//! breaker rejections) come from the retry loop and carry the attempt
//! number; circuit transitions come from breakers the pipeline built. Observers decide what to do with it; the pipeline
//! itself never formats or stores logs.

use std::fmt;
use std::time::Instant;

use guardrail_circuitbreaker::CircuitBreakerEvent;
use guardrail_core::{BoxedEventListener, EventListener, ResilienceEvent};
use guardrail_fallback::FallbackEvent;
use guardrail_retry::RetryEvent;

/// Receives [`PolicyEvent`]s from a pipeline.
pub type PolicyObserver = BoxedEventListener<PolicyEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyEventKind {
    /// An attempt failed and another one is scheduled.
    Retry,
    /// The last allowed attempt failed.
    RetriesExhausted,
    CircuitTransition,
    /// The breaker refused an attempt.
    CircuitRejected,
    /// The bulkhead refused a call.
    BulkheadRejected,
    /// An attempt exceeded its time limit.
    Timeout,
    /// The fallback value replaced a failed result.
    FallbackApplied,
}

impl PolicyEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyEventKind::Retry => "retry",
            PolicyEventKind::RetriesExhausted => "retries_exhausted",
            PolicyEventKind::CircuitTransition => "circuit_transition",
            PolicyEventKind::CircuitRejected => "circuit_rejected",
            PolicyEventKind::BulkheadRejected => "bulkhead_rejected",
            PolicyEventKind::Timeout => "timeout",
            PolicyEventKind::FallbackApplied => "fallback_applied",
        }
    }
}

impl fmt::Display for PolicyEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured record of one policy decision.
#[derive(Debug, Clone)]
pub struct PolicyEvent {
    pub kind: PolicyEventKind,
    /// The protected target the pipeline was built for.
    pub target: String,
    /// 1-based attempt number, when the decision concerns one attempt.
    pub attempt: Option<u32>,
    /// Human readable summary.
    pub detail: String,
    pub timestamp: Instant,
}

impl PolicyEvent {
    fn new(
        kind: PolicyEventKind,
        target: &str,
        attempt: Option<u32>,
        detail: String,
        timestamp: Instant,
    ) -> Self {
        Self {
            kind,
            target: target.to_string(),
            attempt,
            detail,
            timestamp,
        }
    }

    pub fn from_retry(event: &RetryEvent) -> Option<Self> {
        match event {
            RetryEvent::Retry {
                target,
                timestamp,
                attempt,
                delay,
                reason,
            } => Some(Self::new(
                PolicyEventKind::Retry,
                target,
                Some(*attempt),
                format!("retry {attempt} with {delay:?} delay due to {reason}"),
                *timestamp,
            )),
            RetryEvent::TimedOut {
                target,
                timestamp,
                attempt,
                after,
            } => Some(Self::new(
                PolicyEventKind::Timeout,
                target,
                Some(*attempt),
                format!("attempt {attempt} exceeded {after:?}"),
                *timestamp,
            )),
            RetryEvent::CircuitOpen {
                target,
                timestamp,
                attempt,
            } => Some(Self::new(
                PolicyEventKind::CircuitRejected,
                target,
                Some(*attempt),
                format!("attempt {attempt} rejected by the circuit breaker"),
                *timestamp,
            )),
            RetryEvent::Exhausted {
                target,
                timestamp,
                attempts,
                last,
            } => Some(Self::new(
                PolicyEventKind::RetriesExhausted,
                target,
                Some(*attempts),
                format!("gave up after {attempts} attempts, last outcome {last}"),
                *timestamp,
            )),
            _ => None,
        }
    }

    pub fn from_circuit_breaker(event: &CircuitBreakerEvent) -> Option<Self> {
        match event {
            CircuitBreakerEvent::StateTransition {
                target,
                timestamp,
                from_state,
                to_state,
            } => Some(Self::new(
                PolicyEventKind::CircuitTransition,
                target,
                None,
                format!("{} -> {}", from_state.as_str(), to_state.as_str()),
                *timestamp,
            )),
            _ => None,
        }
    }

    pub(crate) fn bulkhead_rejected(
        target: &str,
        max_concurrent: usize,
        max_queued: usize,
        timestamp: Instant,
    ) -> Self {
        Self::new(
            PolicyEventKind::BulkheadRejected,
            target,
            None,
            format!("{max_concurrent} running and {max_queued} queued"),
            timestamp,
        )
    }

    pub fn from_fallback(event: &FallbackEvent) -> Option<Self> {
        match event {
            FallbackEvent::Applied {
                target,
                timestamp,
                cause,
            } => Some(Self::new(
                PolicyEventKind::FallbackApplied,
                target,
                None,
                format!("fallback returned after {cause}"),
                *timestamp,
            )),
            _ => None,
        }
    }
}

impl ResilienceEvent for PolicyEvent {
    fn event_type(&self) -> &'static str {
        self.kind.as_str()
    }

    fn timestamp(&self) -> Instant {
        self.timestamp
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// Forwards policy events to `tracing`.
///
/// Retries, timeouts and rejections are logged at `warn`, everything else at
/// `info`.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

#[cfg(feature = "tracing")]
impl EventListener<PolicyEvent> for TracingObserver {
    fn on_event(&self, event: &PolicyEvent) {
        match event.kind {
            PolicyEventKind::Retry
            | PolicyEventKind::RetriesExhausted
            | PolicyEventKind::Timeout
            | PolicyEventKind::CircuitRejected
            | PolicyEventKind::BulkheadRejected => tracing::warn!(
                target: "guardrail",
                policy_target = %event.target,
                kind = %event.kind,
                attempt = ?event.attempt,
                "{}",
                event.detail
            ),
            PolicyEventKind::CircuitTransition | PolicyEventKind::FallbackApplied => {
                tracing::info!(
                    target: "guardrail",
                    policy_target = %event.target,
                    kind = %event.kind,
                    "{}",
                    event.detail
                )
            }
        }
    }
}

/// Adapts a closure into an observer.
pub(crate) struct FnObserver<F>(pub(crate) F);

impl<F> EventListener<PolicyEvent> for FnObserver<F>
where
    F: Fn(&PolicyEvent) + Send + Sync,
{
    fn on_event(&self, event: &PolicyEvent) {
        (self.0)(event)
    }
}
