use crate::backoff::{ExponentialBackoff, FixedInterval, IntervalFunction};
use crate::events::RetryEvent;
use crate::policy::RetryPolicy;
use crate::RetryOrchestrator;
use guardrail_circuitbreaker::CircuitBreaker;
use guardrail_core::{
    default_clock, Clock, ConfigError, EventListeners, FnListener, OutcomeKind, SharedClock,
};
use guardrail_timelimiter::TimeoutGuard;
use std::sync::Arc;
use std::time::Duration;

pub struct RetryConfig {
    pub(crate) policy: RetryPolicy,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) clock: SharedClock,
    pub(crate) breaker: Option<CircuitBreaker>,
    pub(crate) guard: Option<TimeoutGuard>,
}

impl RetryConfig {
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for a [`RetryOrchestrator`].
pub struct RetryConfigBuilder {
    max_attempts: u32,
    initial_interval: Duration,
    max_interval: Duration,
    interval_fn: Option<Arc<dyn IntervalFunction>>,
    name: String,
    event_listeners: EventListeners<RetryEvent>,
    clock: SharedClock,
    breaker: Option<CircuitBreaker>,
    guard: Option<TimeoutGuard>,
}

impl RetryConfigBuilder {
    /// Defaults: 4 attempts, exponential backoff from a one second base.
    pub fn new() -> Self {
        Self {
            max_attempts: 4,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
            interval_fn: None,
            name: String::from("<unnamed>"),
            event_listeners: EventListeners::new(),
            clock: default_clock(),
            breaker: None,
            guard: None,
        }
    }

    /// Total attempts including the first. Must be at least 1.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Exponential backoff: `base × 2^attempt`.
    pub fn exponential_backoff(mut self, base: Duration) -> Self {
        self.initial_interval = base;
        self.interval_fn = None;
        self
    }

    /// Upper bound for the default exponential backoff.
    pub fn max_backoff(mut self, cap: Duration) -> Self {
        self.max_interval = cap;
        self
    }

    pub fn fixed_backoff(mut self, interval: Duration) -> Self {
        self.interval_fn = Some(Arc::new(FixedInterval::new(interval)));
        self
    }

    /// Uses a custom interval function, replacing the exponential default.
    pub fn backoff<I>(mut self, interval: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval_fn = Some(Arc::new(interval));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Clock used for backoff waits.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn shared_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Consults `breaker` before every attempt and reports outcomes to it.
    pub fn circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Bounds every attempt with `guard`.
    pub fn timeout_guard(mut self, guard: TimeoutGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Called before each backoff wait with the failed attempt number, the
    /// wait and the reason.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration, OutcomeKind) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry {
                attempt,
                delay,
                reason,
                ..
            } = event
            {
                f(*attempt, *delay, *reason);
            }
        }));
        self
    }

    /// Called with the number of attempts it took to succeed.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Called with the number of attempts made when all of them failed.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    pub fn build(self) -> Result<RetryOrchestrator, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "max_attempts",
            });
        }
        let interval = match self.interval_fn {
            Some(interval) => interval,
            None => Arc::new(
                ExponentialBackoff::new(self.initial_interval).max_interval(self.max_interval),
            ),
        };
        Ok(RetryOrchestrator::new(RetryConfig {
            policy: RetryPolicy::new(self.max_attempts, interval),
            name: self.name,
            event_listeners: self.event_listeners,
            clock: self.clock,
            breaker: self.breaker,
            guard: self.guard,
        }))
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
