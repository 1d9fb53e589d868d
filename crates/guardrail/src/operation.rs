//! The downstream call a pipeline protects.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures::future::BoxFuture;
use guardrail_core::AttemptContext;
use tower::{Service, ServiceExt};

/// One attempt at the protected call.
///
/// Called once per attempt. The context carries the attempt number and the
/// cancellation token the attempt should watch; an operation that ignores
/// the token is still dropped when its time limit elapses.
///
/// Any `Fn(AttemptContext) -> impl Future<Output = Result<T, E>>` is an
/// operation.
pub trait Operation<T, E>: Send + Sync {
    type Future: Future<Output = Result<T, E>> + Send;

    fn call(&self, ctx: AttemptContext) -> Self::Future;
}

impl<T, E, F, Fut> Operation<T, E> for F
where
    F: Fn(AttemptContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send,
{
    type Future = Fut;

    fn call(&self, ctx: AttemptContext) -> Fut {
        self(ctx)
    }
}

/// Runs a `tower::Service` as an operation, sending a clone of the same
/// request on every attempt.
pub struct ServiceOperation<S, Req> {
    service: Mutex<S>,
    request: Req,
}

impl<S, Req> ServiceOperation<S, Req> {
    pub fn new(service: S, request: Req) -> Self {
        Self {
            service: Mutex::new(service),
            request,
        }
    }
}

impl<S, Req> Operation<S::Response, S::Error> for ServiceOperation<S, Req>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send,
    Req: Clone + Send + Sync + 'static,
{
    type Future = BoxFuture<'static, Result<S::Response, S::Error>>;

    fn call(&self, _ctx: AttemptContext) -> Self::Future {
        let service = self
            .service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let request = self.request.clone();
        Box::pin(async move { service.oneshot(request).await })
    }
}
