//! Configuration for the bulkhead.

use crate::events::BulkheadEvent;
use crate::Bulkhead;
use guardrail_core::{default_clock, Clock, ConfigError, EventListeners, FnListener, SharedClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub struct BulkheadConfig {
    pub(crate) max_concurrent: usize,
    pub(crate) max_queued: usize,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
    pub(crate) clock: SharedClock,
}

impl BulkheadConfig {
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn max_queued(&self) -> usize {
        self.max_queued
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for a [`Bulkhead`].
pub struct BulkheadConfigBuilder {
    max_concurrent: usize,
    max_queued: usize,
    name: String,
    event_listeners: EventListeners<BulkheadEvent>,
    clock: SharedClock,
}

impl BulkheadConfigBuilder {
    /// Defaults: 10 concurrent calls, 5 queued.
    pub fn new() -> Self {
        Self {
            max_concurrent: 10,
            max_queued: 5,
            name: String::from("<unnamed>"),
            event_listeners: EventListeners::new(),
            clock: default_clock(),
        }
    }

    /// Calls allowed to run at once. Must be at least 1.
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Calls allowed to wait for a slot. Zero disables queueing.
    pub fn max_queued(mut self, max: usize) -> Self {
        self.max_queued = max;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Clock used to time waits and holds in events.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn shared_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Called with the number of running calls when a call gets a slot.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallPermitted { active, .. } = event {
                f(*active);
            }
        }));
        self
    }

    /// Called when a call is turned away.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, BulkheadEvent::CallRejected { .. }) {
                f();
            }
        }));
        self
    }

    /// Called with how long the slot was held when a call releases it.
    pub fn on_call_released<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallReleased { held, .. } = event {
                f(*held);
            }
        }));
        self
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&BulkheadEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    pub fn build(self) -> Result<Bulkhead, ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Zero {
                field: "max_concurrent",
            });
        }
        if self.max_concurrent > Semaphore::MAX_PERMITS {
            return Err(ConfigError::TooLarge {
                field: "max_concurrent",
                max: Semaphore::MAX_PERMITS,
            });
        }
        Ok(Bulkhead::new(BulkheadConfig {
            max_concurrent: self.max_concurrent,
            max_queued: self.max_queued,
            name: self.name,
            event_listeners: self.event_listeners,
            clock: self.clock,
        }))
    }
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
