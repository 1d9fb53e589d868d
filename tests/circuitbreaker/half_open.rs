use futures::future::join_all;
use guardrail::{AttemptContext, CircuitBreaker, CircuitState, ManualClock, Pipeline};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn tripped_pipeline(clock: &ManualClock) -> Pipeline<&'static str, &'static str> {
    let pipeline = Pipeline::builder("inventory")
        .circuit_breaker(
            CircuitBreaker::builder()
                .failure_threshold(1)
                .open_duration(Duration::from_secs(30)),
        )
        .clock(clock.clone())
        .build()
        .unwrap();
    pipeline.circuit_breaker().unwrap().force_open();
    pipeline
}

#[tokio::test(start_paused = true)]
async fn only_one_probe_runs_after_cooldown() {
    let clock = ManualClock::new();
    let pipeline = tripped_pipeline(&clock);
    clock.advance(Duration::from_secs(30));

    let calls = Arc::new(AtomicUsize::new(0));
    let operation = {
        let calls = Arc::clone(&calls);
        move |_ctx: AttemptContext| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, &str>("stock level")
            }
        }
    };

    let results = join_all((0..5).map(|_| pipeline.execute(&operation))).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_circuit_open()))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(refused, 4);
    assert_eq!(
        pipeline.circuit_breaker().unwrap().state(),
        CircuitState::Closed
    );
}

#[tokio::test]
async fn failed_probe_reopens() {
    let clock = ManualClock::new();
    let pipeline = tripped_pipeline(&clock);
    clock.advance(Duration::from_secs(30));

    let result = pipeline
        .execute(|_ctx: AttemptContext| async { Err::<&str, _>("still down") })
        .await;
    assert!(result.unwrap_err().is_operation_error());

    let breaker = pipeline.circuit_breaker().unwrap();
    assert_eq!(breaker.state(), CircuitState::Open);

    // A full new open period must pass before the next probe.
    clock.advance(Duration::from_secs(29));
    assert!(!breaker.allow());
    clock.advance(Duration::from_secs(1));
    assert!(breaker.allow());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[tokio::test]
async fn successful_probe_closes_and_clears_failures() {
    let clock = ManualClock::new();
    let pipeline = tripped_pipeline(&clock);
    clock.advance(Duration::from_secs(31));

    let value = pipeline
        .execute(|_ctx: AttemptContext| async { Ok::<_, &str>("recovered") })
        .await
        .unwrap()
        .into_value();
    assert_eq!(value, "recovered");

    let breaker = pipeline.circuit_breaker().unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.consecutive_failures(), 0);
}

#[test]
fn abandoned_probe_frees_the_slot() {
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder()
        .failure_threshold(1)
        .open_duration(Duration::from_secs(5))
        .clock(clock.clone())
        .build()
        .unwrap();
    breaker.record_failure();
    clock.advance(Duration::from_secs(5));

    let probe = breaker.try_acquire().unwrap();
    assert!(probe.is_probe());
    assert!(breaker.try_acquire().is_none());

    drop(probe);
    assert!(breaker.try_acquire().is_some());
}
