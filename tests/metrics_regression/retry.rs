//! Retry metrics regression tests

use super::helpers::*;
use guardrail::{AttemptContext, AttemptOutcome, CancellationToken, RetryOrchestrator};
use serial_test::serial;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[tokio::test(start_paused = true)]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();

    let retry = RetryOrchestrator::builder()
        .name("metrics_retry")
        .max_attempts(3)
        .fixed_backoff(Duration::from_millis(10))
        .build()
        .unwrap();

    let calls = AtomicU32::new(0);
    let ctx = AttemptContext::new("metrics_retry", CancellationToken::new());
    let outcome: AttemptOutcome<(), ()> = retry
        .execute(&ctx, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    AttemptOutcome::TransientFailure(())
                } else {
                    AttemptOutcome::Success(())
                }
            }
        })
        .await;
    assert!(outcome.is_success());

    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "retry", "metrics_retry");
    assert_metric_has_label("retry_calls_total", "outcome", "success");

    assert_counter_exists("retry_attempts_total");
    assert_metric_has_label("retry_attempts_total", "retry", "metrics_retry");
}

#[tokio::test(start_paused = true)]
#[serial]
async fn retry_exhausted_metrics() {
    init_recorder();

    let retry = RetryOrchestrator::builder()
        .name("metrics_retry_exhausted")
        .max_attempts(2)
        .fixed_backoff(Duration::from_millis(10))
        .build()
        .unwrap();

    let ctx = AttemptContext::new("metrics_retry_exhausted", CancellationToken::new());
    let outcome: AttemptOutcome<(), ()> = retry
        .execute(&ctx, |_| async { AttemptOutcome::TransientFailure(()) })
        .await;
    assert!(!outcome.is_success());

    assert_metric_has_label("retry_calls_total", "retry", "metrics_retry_exhausted");
    assert_metric_has_label("retry_calls_total", "outcome", "exhausted");
}
