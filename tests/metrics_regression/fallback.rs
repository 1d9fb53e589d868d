//! Fallback metrics regression tests

use super::helpers::*;
use guardrail::{AttemptOutcome, FallbackResolver};
use serial_test::serial;

#[test]
#[serial]
fn fallback_metrics_exist() {
    init_recorder();

    let resolver = FallbackResolver::builder()
        .name("metrics_fallback")
        .value(0u32)
        .build()
        .unwrap();

    let _ = resolver.resolve(AttemptOutcome::<u32, ()>::Success(1));
    let _ = resolver.resolve(AttemptOutcome::<u32, ()>::CircuitOpen);

    assert_counter_exists("fallback_calls_total");
    assert_metric_has_label("fallback_calls_total", "fallback", "metrics_fallback");
    assert_metric_has_label("fallback_calls_total", "result", "passthrough");
    assert_metric_has_label("fallback_calls_total", "result", "applied");
    assert_metric_has_label("fallback_calls_total", "cause", "circuit_open");
}
