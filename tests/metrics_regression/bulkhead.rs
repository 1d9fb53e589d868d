//! Bulkhead metrics regression tests

use super::helpers::*;
use guardrail::Bulkhead;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn bulkhead_metrics_exist() {
    init_recorder();

    let bulkhead = Bulkhead::builder()
        .name("metrics_bulkhead")
        .max_concurrent(1)
        .max_queued(0)
        .build()
        .unwrap();

    let ticket = bulkhead.admit().await.unwrap();
    assert!(bulkhead.admit().await.is_err());
    drop(ticket);

    assert_counter_exists("bulkhead_calls_total");
    assert_metric_has_label("bulkhead_calls_total", "bulkhead", "metrics_bulkhead");
    assert_metric_has_label("bulkhead_calls_total", "outcome", "permitted");
    assert_metric_has_label("bulkhead_calls_total", "outcome", "rejected");

    assert_gauge_exists("bulkhead_active_calls");
    assert_histogram_exists("bulkhead_wait_duration_seconds");
}

#[tokio::test]
#[serial]
async fn bulkhead_queue_metrics() {
    init_recorder();

    let bulkhead = Bulkhead::builder()
        .name("metrics_bulkhead_queue")
        .max_concurrent(1)
        .max_queued(1)
        .build()
        .unwrap();

    let held = bulkhead.admit().await.unwrap();
    let waiter = {
        let bulkhead = bulkhead.clone();
        tokio::spawn(async move { bulkhead.admit().await.map(drop) })
    };
    while bulkhead.queued_count() == 0 {
        tokio::task::yield_now().await;
    }
    drop(held);
    waiter.await.unwrap().unwrap();

    assert_gauge_exists("bulkhead_queued_calls");
    assert_metric_has_label("bulkhead_queued_calls", "bulkhead", "metrics_bulkhead_queue");
}
