//! Middleware stages.
//!
//! A pipeline is an ordered list of stages followed by the operation. Each
//! stage gets the call context and a [`Next`] handle for the rest of the
//! chain, and decides whether, when and how often to run it.
//!
//! The built-in order, outermost first, is bulkhead, retry, then any custom
//! stages. Custom stages therefore run once per attempt, inside the timeout.

use futures::future::BoxFuture;
use guardrail_bulkhead::{Bulkhead, BulkheadError};
use guardrail_core::{
    AttemptContext, AttemptOutcome, EventListeners, OutcomeClassifier, SharedClock,
};
use guardrail_retry::RetryOrchestrator;
use std::sync::Arc;

use crate::observe::PolicyEvent;
use crate::operation::Operation;

/// One link in a pipeline.
pub trait Stage<T, E>: Send + Sync {
    fn handle<'a>(
        &'a self,
        ctx: AttemptContext,
        next: Next<'a, T, E>,
    ) -> BoxFuture<'a, AttemptOutcome<T, E>>;
}

pub(crate) type BoxStage<T, E> = Arc<dyn Stage<T, E>>;

/// The end of the chain: runs the operation and classifies its result.
pub(crate) trait Terminal<'a, T, E>: Send + Sync {
    fn call(&self, ctx: AttemptContext) -> BoxFuture<'a, AttemptOutcome<T, E>>;
}

/// The remainder of the chain after the current stage.
pub struct Next<'a, T, E> {
    stages: &'a [BoxStage<T, E>],
    terminal: &'a dyn Terminal<'a, T, E>,
}

impl<'a, T, E> Next<'a, T, E> {
    pub(crate) fn new(
        stages: &'a [BoxStage<T, E>],
        terminal: &'a dyn Terminal<'a, T, E>,
    ) -> Self {
        Self { stages, terminal }
    }

    /// Runs the rest of the chain. May be called more than once.
    pub fn run(self, ctx: AttemptContext) -> BoxFuture<'a, AttemptOutcome<T, E>> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(
                ctx,
                Next {
                    stages: rest,
                    terminal: self.terminal,
                },
            ),
            None => self.terminal.call(ctx),
        }
    }
}

impl<T, E> Clone for Next<'_, T, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, E> Copy for Next<'_, T, E> {}

pub(crate) struct OperationTerminal<'a, O, T, E> {
    operation: &'a O,
    classifier: &'a dyn OutcomeClassifier<T, E>,
}

impl<'a, O, T, E> OperationTerminal<'a, O, T, E> {
    pub(crate) fn new(operation: &'a O, classifier: &'a dyn OutcomeClassifier<T, E>) -> Self {
        Self {
            operation,
            classifier,
        }
    }
}

impl<'a, O, T, E> Terminal<'a, T, E> for OperationTerminal<'a, O, T, E>
where
    O: Operation<T, E>,
    O::Future: 'a,
    T: Send + 'a,
    E: Send + 'a,
{
    fn call(&self, ctx: AttemptContext) -> BoxFuture<'a, AttemptOutcome<T, E>> {
        let result = self.operation.call(ctx);
        let classifier = self.classifier;
        Box::pin(async move { classifier.classify(result.await) })
    }
}

/// Admits the call through a bulkhead and holds the slot for its duration.
pub struct BulkheadStage {
    bulkhead: Bulkhead,
    observers: Option<(Arc<EventListeners<PolicyEvent>>, SharedClock)>,
}

impl BulkheadStage {
    pub fn new(bulkhead: Bulkhead) -> Self {
        Self {
            bulkhead,
            observers: None,
        }
    }

    /// Reports rejections to a pipeline's observers, under the call's target.
    pub(crate) fn observed(
        bulkhead: Bulkhead,
        observers: Option<Arc<EventListeners<PolicyEvent>>>,
        clock: SharedClock,
    ) -> Self {
        Self {
            bulkhead,
            observers: observers.map(|observers| (observers, clock)),
        }
    }
}

impl<T, E> Stage<T, E> for BulkheadStage
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn handle<'a>(
        &'a self,
        ctx: AttemptContext,
        next: Next<'a, T, E>,
    ) -> BoxFuture<'a, AttemptOutcome<T, E>> {
        Box::pin(async move {
            match self.bulkhead.admit_until_cancelled(ctx.cancellation()).await {
                Ok(ticket) => {
                    let outcome = next.run(ctx).await;
                    self.bulkhead.release(ticket);
                    outcome
                }
                Err(BulkheadError::Rejected {
                    max_concurrent,
                    max_queued,
                    ..
                }) => {
                    if let Some((observers, clock)) = &self.observers {
                        observers.emit(&PolicyEvent::bulkhead_rejected(
                            ctx.target(),
                            max_concurrent,
                            max_queued,
                            clock.now(),
                        ));
                    }
                    AttemptOutcome::BulkheadRejected
                }
                Err(BulkheadError::Cancelled) => AttemptOutcome::Cancelled,
            }
        })
    }
}

/// Runs the rest of the chain under a retry orchestrator.
pub struct RetryStage {
    retry: RetryOrchestrator,
}

impl RetryStage {
    pub fn new(retry: RetryOrchestrator) -> Self {
        Self { retry }
    }
}

impl<T, E> Stage<T, E> for RetryStage
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn handle<'a>(
        &'a self,
        ctx: AttemptContext,
        next: Next<'a, T, E>,
    ) -> BoxFuture<'a, AttemptOutcome<T, E>> {
        Box::pin(async move { self.retry.execute(&ctx, |attempt| next.run(attempt)).await })
    }
}
