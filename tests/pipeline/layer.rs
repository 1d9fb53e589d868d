use guardrail::{
    CircuitBreaker, FallbackResolver, Pipeline, PipelineLayer, PolicyError, Resolved,
    RetryOrchestrator, TimeoutGuard,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::{Service, ServiceBuilder, ServiceExt};

#[derive(Debug, Clone, PartialEq)]
struct Request {
    sku: u32,
}

#[tokio::test(start_paused = true)]
async fn layer_retries_flaky_service() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let inner = tower::service_fn(move |req: Request| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                Err("busy")
            } else {
                Ok(req.sku * 10)
            }
        }
    });

    let pipeline = Pipeline::<u32, &str>::builder("catalog")
        .retry(
            RetryOrchestrator::builder()
                .max_attempts(3)
                .fixed_backoff(Duration::from_millis(50)),
        )
        .build()
        .unwrap();
    let mut service = ServiceBuilder::new()
        .layer(PipelineLayer::new(pipeline))
        .service(inner);

    let response = service
        .ready()
        .await
        .unwrap()
        .call(Request { sku: 4 })
        .await
        .unwrap();
    assert_eq!(response, Resolved::Success(40));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn layered_services_share_one_breaker() {
    let pipeline = Arc::new(
        Pipeline::<u32, &str>::builder("catalog")
            .circuit_breaker(CircuitBreaker::builder().failure_threshold(2))
            .build()
            .unwrap(),
    );
    let layer = PipelineLayer::shared(Arc::clone(&pipeline));
    let failing = tower::service_fn(|_: u32| async { Err::<u32, _>("down") });

    let a = ServiceBuilder::new().layer(layer.clone()).service(failing);
    let b = ServiceBuilder::new().layer(layer).service(failing);

    assert!(a.clone().oneshot(1).await.is_err());
    assert!(b.clone().oneshot(2).await.is_err());

    let refused = a.oneshot(3).await.unwrap_err();
    assert_eq!(
        refused,
        PolicyError::CircuitOpen {
            target: "catalog".to_string()
        }
    );
    assert!(pipeline.circuit_breaker().unwrap().is_open());
}

#[tokio::test(start_paused = true)]
async fn slow_service_times_out_into_fallback() {
    let slow = tower::service_fn(|_: ()| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, std::io::Error>("fresh")
    });
    let pipeline = Pipeline::<&str, std::io::Error>::builder("catalog")
        .time_limiter(TimeoutGuard::builder().timeout(Duration::from_secs(1)))
        .fallback(FallbackResolver::builder().value("cached"))
        .build()
        .unwrap();

    let service = ServiceBuilder::new()
        .layer(PipelineLayer::new(pipeline))
        .service(slow);

    let resolved = service.oneshot(()).await.unwrap();
    assert!(resolved.is_fallback());
    assert_eq!(*resolved.value(), "cached");
}
