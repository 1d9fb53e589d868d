//! Configuration for the timeout guard.

use crate::events::TimeLimiterEvent;
use crate::TimeoutGuard;
use guardrail_core::{default_clock, Clock, ConfigError, EventListeners, FnListener, SharedClock};
use std::sync::Arc;
use std::time::Duration;

pub struct TimeLimiterConfig {
    pub(crate) timeout: Duration,
    pub(crate) event_listeners: EventListeners<TimeLimiterEvent>,
    pub(crate) name: String,
    pub(crate) clock: SharedClock,
}

impl TimeLimiterConfig {
    pub fn builder() -> TimeLimiterConfigBuilder {
        TimeLimiterConfigBuilder::new()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for a [`TimeoutGuard`].
pub struct TimeLimiterConfigBuilder {
    timeout: Duration,
    event_listeners: EventListeners<TimeLimiterEvent>,
    name: String,
    clock: SharedClock,
}

impl TimeLimiterConfigBuilder {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
            clock: default_clock(),
        }
    }

    /// Time limit applied to each attempt.
    ///
    /// Default: 10 seconds
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Sets the name of this guard for observability.
    ///
    /// Default: `"<unnamed>"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn shared_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Called with the elapsed time when an attempt finishes in time.
    pub fn on_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TimeLimiterEvent::Completed { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Called when an attempt exceeds the time limit.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, TimeLimiterEvent::Timeout { .. }) {
                f();
            }
        }));
        self
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&TimeLimiterEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    pub fn build(self) -> Result<TimeoutGuard, ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::Zero { field: "timeout" });
        }
        Ok(TimeoutGuard::new(TimeLimiterConfig {
            timeout: self.timeout,
            event_listeners: self.event_listeners,
            name: self.name,
            clock: self.clock,
        }))
    }
}

impl Default for TimeLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
