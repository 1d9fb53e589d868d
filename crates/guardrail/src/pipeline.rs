use std::fmt;
use std::sync::Arc;

use guardrail_bulkhead::{Bulkhead, BulkheadConfigBuilder};
use guardrail_circuitbreaker::{CircuitBreaker, CircuitBreakerConfigBuilder};
use guardrail_core::{
    default_clock, AttemptContext, AttemptOutcome, CancellationToken, Clock, ConfigError,
    DefaultClassifier, EventListener, EventListeners, OutcomeClassifier, PolicyError, SharedClock,
};
use guardrail_fallback::{FallbackConfigBuilder, FallbackResolver, Resolved};
use guardrail_retry::{RetryConfigBuilder, RetryOrchestrator};
use guardrail_timelimiter::{TimeLimiterConfigBuilder, TimeoutGuard};
#[cfg(feature = "metrics")]
use metrics::counter;
use tokio_util::sync::DropGuard;

use crate::observe::{FnObserver, PolicyEvent, PolicyObserver};
use crate::operation::Operation;
use crate::settings::PipelineSettings;
use crate::stage::{BoxStage, BulkheadStage, Next, OperationTerminal, RetryStage, Stage};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// Per-call options for [`Pipeline::execute_with`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    strict: bool,
    cancel: Option<CancellationToken>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the raw [`PolicyError`] instead of the fallback value.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Cancels the call when `token` is cancelled. The pipeline only ever
    /// cancels a child of `token`.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// One logical request in flight.
///
/// Owns the call's cancellation token and cancels it when dropped, so an
/// abandoned call stops its attempt and any pending timers.
struct PendingCall {
    ctx: AttemptContext,
    _cancel_on_drop: DropGuard,
}

impl PendingCall {
    fn new(target: Arc<str>, parent: Option<CancellationToken>) -> Self {
        let token = match parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        Self {
            ctx: AttemptContext::new(target, token.clone()),
            _cancel_on_drop: token.drop_guard(),
        }
    }
}

/// Composed resilience policies for one target.
///
/// Built once and shared; every call runs bulkhead admission, the retry loop
/// (breaker gate and timeout per attempt) and fallback resolution.
pub struct Pipeline<T, E> {
    target: Arc<str>,
    stages: Vec<BoxStage<T, E>>,
    classifier: Arc<dyn OutcomeClassifier<T, E>>,
    fallback: Option<FallbackResolver<T>>,
    breaker: Option<CircuitBreaker>,
    bulkhead: Option<Bulkhead>,
    guard: Option<TimeoutGuard>,
    retry: RetryOrchestrator,
}

impl<T, E> Pipeline<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn builder(target: impl Into<String>) -> PipelineBuilder<T, E> {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            metrics::describe_counter!(
                "pipeline_calls_total",
                "Calls through a guardrail pipeline, by result"
            );
        });
        PipelineBuilder::new(target)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_ref()
    }

    pub fn bulkhead(&self) -> Option<&Bulkhead> {
        self.bulkhead.as_ref()
    }

    pub fn timeout_guard(&self) -> Option<&TimeoutGuard> {
        self.guard.as_ref()
    }

    pub fn retry(&self) -> &RetryOrchestrator {
        &self.retry
    }

    pub fn fallback(&self) -> Option<&FallbackResolver<T>> {
        self.fallback.as_ref()
    }

    /// Runs `operation` through every policy.
    ///
    /// Returns the genuine result or, when a fallback is configured and the
    /// call failed, the designated fallback value. Without a fallback, or
    /// for failures the fallback does not handle, the error is returned.
    pub async fn execute<O>(&self, operation: O) -> Result<Resolved<T>, PolicyError<E>>
    where
        O: Operation<T, E>,
    {
        self.execute_with(operation, ExecuteOptions::default()).await
    }

    /// Like [`execute`](Self::execute), with per-call options.
    pub async fn execute_with<O>(
        &self,
        operation: O,
        options: ExecuteOptions,
    ) -> Result<Resolved<T>, PolicyError<E>>
    where
        O: Operation<T, E>,
    {
        let outcome = self.run(&operation, options.cancel).await;

        let resolved = match &self.fallback {
            Some(fallback) if !options.strict => match fallback.resolve(outcome) {
                Ok(resolved) => Ok(resolved),
                Err(outcome) => outcome.into_result(&self.target).map(Resolved::Success),
            },
            _ => outcome.into_result(&self.target).map(Resolved::Success),
        };

        #[cfg(feature = "tracing")]
        match &resolved {
            Ok(Resolved::Success(_)) => {
                tracing::debug!(target_name = %self.target, "call succeeded")
            }
            Ok(Resolved::Fallback { cause, .. }) => {
                tracing::debug!(target_name = %self.target, %cause, "call resolved by fallback")
            }
            Err(error) => {
                tracing::debug!(target_name = %self.target, kind = %error.kind(), "call failed")
            }
        }
        #[cfg(feature = "metrics")]
        {
            let result = match &resolved {
                Ok(Resolved::Success(_)) => "success",
                Ok(Resolved::Fallback { .. }) => "fallback",
                Err(_) => "error",
            };
            counter!("pipeline_calls_total", "target" => self.target.to_string(), "result" => result)
                .increment(1);
        }

        resolved
    }

    /// Runs the stages and the operation, returning the final outcome before
    /// fallback resolution.
    pub async fn run<O>(
        &self,
        operation: &O,
        cancel: Option<CancellationToken>,
    ) -> AttemptOutcome<T, E>
    where
        O: Operation<T, E>,
    {
        let call = PendingCall::new(Arc::clone(&self.target), cancel);
        let terminal = OperationTerminal::new(operation, &*self.classifier);
        Next::new(&self.stages, &terminal).run(call.ctx.clone()).await
    }
}

impl<T, E> fmt::Debug for Pipeline<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("target", &self.target)
            .field("stages", &self.stages.len())
            .field("breaker", &self.breaker)
            .field("bulkhead", &self.bulkhead)
            .field("guard", &self.guard)
            .field("retry", &self.retry)
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// A policy the pipeline builds itself, or one built elsewhere and shared.
enum Provided<B, P> {
    Configured(B),
    Shared(P),
}

/// Builder for a [`Pipeline`].
///
/// Takes each policy's own builder. At build time every policy is named
/// after the pipeline's target, given the pipeline's clock (when one is set)
/// and wired to the pipeline's observers. A breaker or bulkhead handed in
/// through [`shared_circuit_breaker`](Self::shared_circuit_breaker) or
/// [`shared_bulkhead`](Self::shared_bulkhead) is used as is.
pub struct PipelineBuilder<T, E> {
    target: String,
    breaker: Option<Provided<CircuitBreakerConfigBuilder, CircuitBreaker>>,
    time_limiter: Option<TimeLimiterConfigBuilder>,
    retry: Option<RetryConfigBuilder>,
    bulkhead: Option<Provided<BulkheadConfigBuilder, Bulkhead>>,
    fallback: Option<FallbackConfigBuilder<T>>,
    classifier: Arc<dyn OutcomeClassifier<T, E>>,
    stages: Vec<BoxStage<T, E>>,
    observers: EventListeners<PolicyEvent>,
    clock: Option<SharedClock>,
}

impl<T, E> PipelineBuilder<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            breaker: None,
            time_limiter: None,
            retry: None,
            bulkhead: None,
            fallback: None,
            classifier: Arc::new(DefaultClassifier),
            stages: Vec::new(),
            observers: EventListeners::new(),
            clock: None,
        }
    }

    /// Configures every policy from `settings`. The fallback value, the
    /// classifier and observers still have to be supplied in code.
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(settings.target.clone())
            .retry(
                RetryOrchestrator::builder()
                    .max_attempts(settings.retry.max_attempts)
                    .exponential_backoff(settings.retry.backoff_base())
                    .max_backoff(settings.retry.max_backoff()),
            )
            .time_limiter(TimeoutGuard::builder().timeout(settings.timeout.timeout()))
            .circuit_breaker(
                CircuitBreaker::builder()
                    .failure_threshold(settings.circuit_breaker.failure_threshold)
                    .open_duration(settings.circuit_breaker.open_duration()),
            )
            .bulkhead(
                Bulkhead::builder()
                    .max_concurrent(settings.bulkhead.max_concurrent)
                    .max_queued(settings.bulkhead.max_queued),
            )
    }

    pub fn circuit_breaker(mut self, builder: CircuitBreakerConfigBuilder) -> Self {
        self.breaker = Some(Provided::Configured(builder));
        self
    }

    /// Uses an existing breaker, typically one per target shared by every
    /// pipeline that calls it.
    ///
    /// The breaker keeps its own name, clock and listeners, so its state
    /// transitions are not reported to this pipeline's observers. Rejections
    /// of this pipeline's attempts still are.
    pub fn shared_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(Provided::Shared(breaker));
        self
    }

    /// Per-attempt time limit.
    pub fn time_limiter(mut self, builder: TimeLimiterConfigBuilder) -> Self {
        self.time_limiter = Some(builder);
        self
    }

    /// Retry policy. Without one the pipeline makes a single attempt.
    pub fn retry(mut self, builder: RetryConfigBuilder) -> Self {
        self.retry = Some(builder);
        self
    }

    pub fn bulkhead(mut self, builder: BulkheadConfigBuilder) -> Self {
        self.bulkhead = Some(Provided::Configured(builder));
        self
    }

    /// Uses an existing bulkhead, so several pipelines draw from one pool of
    /// slots. Each call still holds its slot across all of its attempts.
    pub fn shared_bulkhead(mut self, bulkhead: Bulkhead) -> Self {
        self.bulkhead = Some(Provided::Shared(bulkhead));
        self
    }

    pub fn fallback(mut self, builder: FallbackConfigBuilder<T>) -> Self {
        self.fallback = Some(builder);
        self
    }

    /// Decides which operation errors are transient.
    ///
    /// Default: [`DefaultClassifier`], every error is transient.
    pub fn classifier<C>(mut self, classifier: C) -> Self
    where
        C: OutcomeClassifier<T, E> + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Appends a custom stage. Custom stages run inside the retry loop, once
    /// per attempt, in the order they were added.
    pub fn stage<S>(mut self, stage: S) -> Self
    where
        S: Stage<T, E> + 'static,
    {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Clock for every policy in the pipeline.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn shared_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Registers an observer for [`PolicyEvent`]s.
    ///
    /// Observers run synchronously inside the policy that made the decision
    /// and must not call back into the pipeline.
    pub fn observer<L>(mut self, observer: L) -> Self
    where
        L: EventListener<PolicyEvent> + 'static,
    {
        self.observers.add(observer);
        self
    }

    pub fn shared_observer(mut self, observer: PolicyObserver) -> Self {
        self.observers.add_shared(observer);
        self
    }

    pub fn on_event<F>(self, f: F) -> Self
    where
        F: Fn(&PolicyEvent) + Send + Sync + 'static,
    {
        self.observer(FnObserver(f))
    }

    pub fn build(self) -> Result<Pipeline<T, E>, ConfigError> {
        let target = self.target;
        let clock = self.clock;
        let observers = (!self.observers.is_empty()).then(|| Arc::new(self.observers));

        let breaker = match self.breaker {
            Some(Provided::Shared(breaker)) => Some(breaker),
            Some(Provided::Configured(mut builder)) => {
                builder = builder.name(target.clone());
                if let Some(clock) = &clock {
                    builder = builder.shared_clock(Arc::clone(clock));
                }
                if let Some(observers) = &observers {
                    let observers = Arc::clone(observers);
                    builder = builder.on_event(move |event| {
                        if let Some(event) = PolicyEvent::from_circuit_breaker(event) {
                            observers.emit(&event);
                        }
                    });
                }
                Some(builder.build()?)
            }
            None => None,
        };

        let guard = match self.time_limiter {
            Some(mut builder) => {
                builder = builder.name(target.clone());
                if let Some(clock) = &clock {
                    builder = builder.shared_clock(Arc::clone(clock));
                }
                Some(builder.build()?)
            }
            None => None,
        };

        let bulkhead = match self.bulkhead {
            Some(Provided::Shared(bulkhead)) => Some(bulkhead),
            Some(Provided::Configured(mut builder)) => {
                builder = builder.name(target.clone());
                if let Some(clock) = &clock {
                    builder = builder.shared_clock(Arc::clone(clock));
                }
                Some(builder.build()?)
            }
            None => None,
        };

        let retry = {
            let mut builder = self
                .retry
                .unwrap_or_else(|| RetryOrchestrator::builder().max_attempts(1))
                .name(target.clone());
            if let Some(clock) = &clock {
                builder = builder.shared_clock(Arc::clone(clock));
            }
            if let Some(observers) = &observers {
                let observers = Arc::clone(observers);
                builder = builder.on_event(move |event| {
                    if let Some(event) = PolicyEvent::from_retry(event) {
                        observers.emit(&event);
                    }
                });
            }
            if let Some(breaker) = &breaker {
                builder = builder.circuit_breaker(breaker.clone());
            }
            if let Some(guard) = &guard {
                builder = builder.timeout_guard(guard.clone());
            }
            builder.build()?
        };

        let fallback = match self.fallback {
            Some(mut builder) => {
                builder = builder.name(target.clone());
                if let Some(clock) = &clock {
                    builder = builder.shared_clock(Arc::clone(clock));
                }
                if let Some(observers) = &observers {
                    let observers = Arc::clone(observers);
                    builder = builder.on_event(move |event| {
                        if let Some(event) = PolicyEvent::from_fallback(event) {
                            observers.emit(&event);
                        }
                    });
                }
                Some(builder.build()?)
            }
            None => None,
        };

        let mut stages: Vec<BoxStage<T, E>> = Vec::with_capacity(self.stages.len() + 2);
        if let Some(bulkhead) = &bulkhead {
            stages.push(Arc::new(BulkheadStage::observed(
                bulkhead.clone(),
                observers.clone(),
                clock.clone().unwrap_or_else(default_clock),
            )));
        }
        stages.push(Arc::new(RetryStage::new(retry.clone())));
        stages.extend(self.stages);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target_name = %target,
            breaker = breaker.is_some(),
            bulkhead = bulkhead.is_some(),
            timeout = guard.is_some(),
            fallback = fallback.is_some(),
            stages = stages.len(),
            "pipeline built"
        );

        Ok(Pipeline {
            target: target.into(),
            stages,
            classifier: self.classifier,
            fallback,
            breaker,
            bulkhead,
            guard,
            retry,
        })
    }
}
