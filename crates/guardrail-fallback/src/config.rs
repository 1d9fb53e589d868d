use crate::events::FallbackEvent;
use crate::FallbackResolver;
use guardrail_core::{
    default_clock, Clock, ConfigError, EventListeners, FnListener, OutcomeKind, SharedClock,
};
use std::sync::Arc;

pub(crate) type ValueFn<T> = Arc<dyn Fn(OutcomeKind) -> T + Send + Sync>;
pub(crate) type HandlePredicate = Arc<dyn Fn(OutcomeKind) -> bool + Send + Sync>;

/// Configuration for the fallback resolver.
pub struct FallbackConfig<T> {
    pub(crate) value_fn: ValueFn<T>,
    pub(crate) strategy: &'static str,
    pub(crate) handle: Option<HandlePredicate>,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<FallbackEvent>,
    pub(crate) clock: SharedClock,
}

impl<T> FallbackConfig<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"value"` or `"from_kind"`.
    pub fn strategy(&self) -> &'static str {
        self.strategy
    }

    /// Whether a failure of this kind is replaced by the fallback value.
    pub fn handles(&self, kind: OutcomeKind) -> bool {
        match &self.handle {
            Some(predicate) => predicate(kind),
            None => true,
        }
    }
}

/// Builder for a [`FallbackResolver`].
pub struct FallbackConfigBuilder<T> {
    value_fn: Option<(ValueFn<T>, &'static str)>,
    handle: Option<HandlePredicate>,
    name: String,
    event_listeners: EventListeners<FallbackEvent>,
    clock: SharedClock,
}

impl<T> FallbackConfigBuilder<T> {
    pub fn new() -> Self {
        Self {
            value_fn: None,
            handle: None,
            name: String::from("<unnamed>"),
            event_listeners: EventListeners::new(),
            clock: default_clock(),
        }
    }

    /// Returns a clone of `value` for every eligible failure.
    pub fn value(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.value_fn = Some((Arc::new(move |_| value.clone()), "value"));
        self
    }

    /// Builds the fallback value from the kind of failure.
    pub fn from_kind<F>(mut self, f: F) -> Self
    where
        F: Fn(OutcomeKind) -> T + Send + Sync + 'static,
    {
        self.value_fn = Some((Arc::new(f), "from_kind"));
        self
    }

    /// Restricts the fallback to failures for which `predicate` is true.
    /// Other failures are handed back to the caller unchanged.
    ///
    /// Default: every failure is handled.
    pub fn handle<F>(mut self, predicate: F) -> Self
    where
        F: Fn(OutcomeKind) -> bool + Send + Sync + 'static,
    {
        self.handle = Some(Arc::new(predicate));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Clock used to timestamp events.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn shared_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Called with the failure kind whenever the fallback value is returned.
    pub fn on_applied<F>(mut self, f: F) -> Self
    where
        F: Fn(OutcomeKind) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FallbackEvent::Applied { cause, .. } = event {
                f(*cause);
            }
        }));
        self
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&FallbackEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    pub fn build(self) -> Result<FallbackResolver<T>, ConfigError> {
        let (value_fn, strategy) = self
            .value_fn
            .ok_or(ConfigError::Missing { field: "strategy" })?;
        Ok(FallbackResolver::new(FallbackConfig {
            value_fn,
            strategy,
            handle: self.handle,
            name: self.name,
            event_listeners: self.event_listeners,
            clock: self.clock,
        }))
    }
}

impl<T> Default for FallbackConfigBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
