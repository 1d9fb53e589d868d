//! Circuit breaker metrics regression tests

use super::helpers::*;
use guardrail::{CircuitBreaker, ManualClock};
use serial_test::serial;

#[test]
#[serial]
fn circuitbreaker_metrics_exist() {
    init_recorder();

    let breaker = CircuitBreaker::builder()
        .name("metrics_cb")
        .failure_threshold(2)
        .clock(ManualClock::new())
        .build()
        .unwrap();

    assert!(breaker.allow());
    breaker.record_success();
    breaker.record_failure();
    breaker.record_failure();
    assert!(!breaker.allow());

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "metrics_cb");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "permitted");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");

    assert_counter_exists("circuitbreaker_outcomes_total");
    assert_metric_has_label("circuitbreaker_outcomes_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_outcomes_total", "outcome", "failure");

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "open");

    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "circuitbreaker", "metrics_cb");
}
