//! Time limiter metrics regression tests

use super::helpers::*;
use guardrail::{AttemptOutcome, CancellationToken, TimeoutGuard};
use serial_test::serial;
use std::time::Duration;

#[tokio::test(start_paused = true)]
#[serial]
async fn timelimiter_metrics_exist() {
    init_recorder();

    let guard = TimeoutGuard::builder()
        .name("metrics_tl")
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    let fast: AttemptOutcome<(), ()> = guard
        .run_with_timeout(|_| async { AttemptOutcome::Success(()) }, &cancel)
        .await;
    assert!(fast.is_success());

    let slow: AttemptOutcome<(), ()> = guard
        .run_with_timeout(
            |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                AttemptOutcome::Success(())
            },
            &cancel,
        )
        .await;
    assert!(slow.is_retryable());

    assert_counter_exists("timelimiter_calls_total");
    assert_metric_has_label("timelimiter_calls_total", "timelimiter", "metrics_tl");
    assert_metric_has_label("timelimiter_calls_total", "outcome", "completed");
    assert_metric_has_label("timelimiter_calls_total", "outcome", "timeout");
}
