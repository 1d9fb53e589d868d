use guardrail::{
    AttemptContext, Bulkhead, CircuitBreaker, CircuitState, Pipeline, PolicyError,
    PolicyEventKind, RetryOrchestrator,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Seen = Arc<Mutex<Vec<(PolicyEventKind, Option<u32>)>>>;

type Reply = std::future::Ready<Result<(), &'static str>>;

/// Counts calls into `calls` and always fails with "503".
fn failing(calls: &Arc<AtomicU32>) -> impl Fn(AttemptContext) -> Reply + use<> {
    let calls = Arc::clone(calls);
    move |_ctx| {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err("503"))
    }
}

#[tokio::test(start_paused = true)]
async fn two_pipelines_trip_one_breaker() {
    let breaker = CircuitBreaker::builder()
        .name("users-api")
        .failure_threshold(2)
        .open_duration(Duration::from_secs(30))
        .build()
        .unwrap();
    let seen: Seen = Arc::default();
    let sink = Arc::clone(&seen);

    let profiles = Pipeline::<(), &str>::builder("users-api/profiles")
        .shared_circuit_breaker(breaker.clone())
        .build()
        .unwrap();
    let search = Pipeline::<(), &str>::builder("users-api/search")
        .shared_circuit_breaker(breaker.clone())
        .on_event(move |event| sink.lock().unwrap().push((event.kind, event.attempt)))
        .build()
        .unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    assert!(profiles.execute(failing(&calls)).await.is_err());
    assert_eq!(breaker.consecutive_failures(), 1);
    assert!(search.execute(failing(&calls)).await.is_err());

    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(
        profiles.circuit_breaker().unwrap().state(),
        CircuitState::Open
    );

    assert_eq!(
        search.execute(failing(&calls)).await,
        Err(PolicyError::CircuitOpen {
            target: "users-api/search".to_string()
        })
    );
    assert!(profiles
        .execute(failing(&calls))
        .await
        .unwrap_err()
        .is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (PolicyEventKind::RetriesExhausted, Some(1)),
            (PolicyEventKind::CircuitRejected, Some(1)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn shared_bulkhead_holds_one_slot_across_retries() {
    let bulkhead = Bulkhead::builder()
        .name("users-api")
        .max_concurrent(1)
        .max_queued(0)
        .build()
        .unwrap();
    let seen: Seen = Arc::default();
    let sink = Arc::clone(&seen);

    let profiles = Arc::new(
        Pipeline::<(), &str>::builder("users-api/profiles")
            .shared_bulkhead(bulkhead.clone())
            .retry(
                RetryOrchestrator::builder()
                    .max_attempts(3)
                    .fixed_backoff(Duration::from_secs(1)),
            )
            .build()
            .unwrap(),
    );
    let search = Pipeline::<(), &str>::builder("users-api/search")
        .shared_bulkhead(bulkhead.clone())
        .on_event(move |event| sink.lock().unwrap().push((event.kind, event.attempt)))
        .build()
        .unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let retrying = {
        let profiles = Arc::clone(&profiles);
        let operation = failing(&calls);
        tokio::spawn(async move { profiles.execute(operation).await })
    };
    while calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    // The first attempt failed and the call is backing off, still holding
    // the only slot.
    assert_eq!(bulkhead.active_count(), 1);
    assert_eq!(
        search
            .execute(|_ctx: AttemptContext| async { Ok::<_, &str>(()) })
            .await,
        Err(PolicyError::BulkheadRejected {
            target: "users-api/search".to_string()
        })
    );
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(PolicyEventKind::BulkheadRejected, None)]
    );

    assert_eq!(retrying.await.unwrap(), Err(PolicyError::Transient("503")));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(bulkhead.active_count(), 0);
    assert!(search
        .execute(|_ctx: AttemptContext| async { Ok::<_, &str>(()) })
        .await
        .is_ok());
}
