//! Tower integration for [`Pipeline`].

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use guardrail_core::PolicyError;
use guardrail_fallback::Resolved;
use tower::{Layer, Service};

use crate::operation::ServiceOperation;
use crate::Pipeline;

/// Layer that runs every request through a shared [`Pipeline`].
pub struct PipelineLayer<T, E> {
    pipeline: Arc<Pipeline<T, E>>,
}

impl<T, E> PipelineLayer<T, E> {
    pub fn new(pipeline: Pipeline<T, E>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn shared(pipeline: Arc<Pipeline<T, E>>) -> Self {
        Self { pipeline }
    }
}

impl<T, E> Clone for PipelineLayer<T, E> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<S, T, E> Layer<S> for PipelineLayer<T, E> {
    type Service = PipelineService<S, T, E>;

    fn layer(&self, inner: S) -> Self::Service {
        PipelineService {
            inner,
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

/// Service produced by [`PipelineLayer`].
///
/// Each attempt sends a clone of the request to a clone of the inner service,
/// so the inner service's own readiness is awaited per attempt.
pub struct PipelineService<S, T, E> {
    inner: S,
    pipeline: Arc<Pipeline<T, E>>,
}

impl<S: Clone, T, E> Clone for PipelineService<S, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<S, T, E> PipelineService<S, T, E> {
    pub fn pipeline(&self) -> &Pipeline<T, E> {
        &self.pipeline
    }
}

impl<S, Req, T, E> Service<Req> for PipelineService<S, T, E>
where
    S: Service<Req, Response = T, Error = E> + Clone + Send + 'static,
    S::Future: Send,
    T: Send + 'static,
    E: Send + 'static,
    Req: Clone + Send + Sync + 'static,
{
    type Response = Resolved<T>;
    type Error = PolicyError<E>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let pipeline = Arc::clone(&self.pipeline);
        let operation = ServiceOperation::new(self.inner.clone(), req);
        Box::pin(async move { pipeline.execute(operation).await })
    }
}
