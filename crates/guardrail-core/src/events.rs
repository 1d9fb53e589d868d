//! Event plumbing shared by every policy.
//!
//! Each policy defines its own event enum, implements [`ResilienceEvent`] for
//! it, and fans events out through an [`EventListeners`] collection that is
//! filled in by the policy's builder.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a policy instance.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Short snake_case identifier such as `"state_transition"` or `"retry"`.
    fn event_type(&self) -> &'static str;

    /// When the event was produced, as reported by the policy's clock.
    fn timestamp(&self) -> Instant;

    /// Name of the policy instance (usually the protected target).
    fn target(&self) -> &str;
}

/// Receives events of one type.
///
/// Listeners run synchronously on the task that produced the event, sometimes
/// while the policy holds internal state. They must not call back into the
/// policy that is notifying them.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// An ordered set of listeners.
#[derive(Clone)]
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Appends a listener. Listeners are notified in insertion order.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Appends an already shared listener.
    pub fn add_shared(&mut self, listener: BoxedEventListener<E>) {
        self.listeners.push(listener);
    }

    /// Delivers `event` to every listener.
    ///
    /// A panicking listener is contained; the remaining listeners still run
    /// and the panic never reaches the policy.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let delivered = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if delivered.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    target_name = event.target(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
