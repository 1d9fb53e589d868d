use guardrail::{
    AttemptContext, AttemptOutcome, CancellationToken, CircuitBreaker, CircuitState,
    ManualClock, Pipeline, PolicyError, TimeoutGuard,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn manual_clock_drives_the_deadline() {
    let clock = ManualClock::new();
    let guard = TimeoutGuard::builder()
        .timeout(Duration::from_secs(10))
        .clock(clock.clone())
        .build()
        .unwrap();

    let attempt = tokio::spawn(async move {
        guard
            .run_with_timeout(
                |token| async move {
                    token.cancelled().await;
                    AttemptOutcome::<(), ()>::Cancelled
                },
                &CancellationToken::new(),
            )
            .await
    });
    while clock.pending_timers() == 0 {
        tokio::task::yield_now().await;
    }

    clock.advance(Duration::from_secs(9));
    assert!(!attempt.is_finished());
    clock.advance(Duration::from_secs(1));

    assert_eq!(
        attempt.await.unwrap(),
        AttemptOutcome::TimedOut {
            after: Duration::from_secs(10)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn timed_out_attempt_sees_its_token_cancelled() {
    let stopped = Arc::new(AtomicBool::new(false));
    let pipeline = Pipeline::<(), ()>::builder("thumbnails")
        .time_limiter(TimeoutGuard::builder().timeout(Duration::from_secs(2)))
        .build()
        .unwrap();

    let flag = Arc::clone(&stopped);
    let result = pipeline
        .execute(move |ctx: AttemptContext| {
            let token = ctx.cancellation().clone();
            let flag = Arc::clone(&flag);
            // Background work outlives the attempt future and watches the token.
            tokio::spawn(async move {
                token.cancelled().await;
                flag.store(true, Ordering::SeqCst);
            });
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, ()>(())
            }
        })
        .await;

    assert_eq!(
        result,
        Err(PolicyError::TimedOut {
            after: Duration::from_secs(2)
        })
    );
    while !stopped.load(Ordering::SeqCst) {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn every_attempt_gets_a_fresh_limit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::<usize, ()>::builder("thumbnails")
        .retry(
            guardrail::RetryOrchestrator::builder()
                .max_attempts(2)
                .fixed_backoff(Duration::from_secs(1)),
        )
        .time_limiter(TimeoutGuard::builder().timeout(Duration::from_secs(5)))
        .build()
        .unwrap();

    let counter = Arc::clone(&calls);
    let started = tokio::time::Instant::now();
    let value = pipeline
        .execute(move |_ctx: AttemptContext| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                // First attempt overruns, second finishes just inside the limit.
                let work = if n == 0 { 6 } else { 4 };
                tokio::time::sleep(Duration::from_secs(work)).await;
                Ok::<_, ()>(n)
            }
        })
        .await
        .unwrap()
        .into_value();

    assert_eq!(value, 1);
    assert_eq!(started.elapsed(), Duration::from_secs(5 + 1 + 4));
}

#[tokio::test(start_paused = true)]
async fn timeouts_count_as_breaker_failures() {
    let pipeline = Pipeline::<(), ()>::builder("thumbnails")
        .retry(
            guardrail::RetryOrchestrator::builder()
                .max_attempts(2)
                .fixed_backoff(Duration::from_millis(10)),
        )
        .time_limiter(TimeoutGuard::builder().timeout(Duration::from_secs(1)))
        .circuit_breaker(CircuitBreaker::builder().failure_threshold(2))
        .build()
        .unwrap();

    let result = pipeline
        .execute(|_ctx: AttemptContext| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, ()>(())
        })
        .await;

    assert!(result.unwrap_err().is_timeout());
    assert_eq!(
        pipeline.circuit_breaker().unwrap().state(),
        CircuitState::Open
    );
}

#[test]
fn zero_timeout_is_a_config_error() {
    assert!(TimeoutGuard::builder().timeout(Duration::ZERO).build().is_err());
}
