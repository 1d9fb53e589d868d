//! Pipeline metrics regression tests

use super::helpers::*;
use guardrail::{AttemptContext, FallbackResolver, Pipeline};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn pipeline_metrics_exist() {
    init_recorder();

    let pipeline = Pipeline::<u8, ()>::builder("metrics_pipeline")
        .fallback(FallbackResolver::builder().value(0))
        .build()
        .unwrap();

    pipeline
        .execute(|_ctx: AttemptContext| async { Ok::<_, ()>(1) })
        .await
        .unwrap();
    pipeline
        .execute(|_ctx: AttemptContext| async { Err::<u8, _>(()) })
        .await
        .unwrap();

    assert_counter_exists("pipeline_calls_total");
    assert_metric_has_label("pipeline_calls_total", "target", "metrics_pipeline");
    assert_metric_has_label("pipeline_calls_total", "result", "success");
    assert_metric_has_label("pipeline_calls_total", "result", "fallback");

    // Every policy in the pipeline is named after the target.
    assert_metric_has_label("retry_calls_total", "retry", "metrics_pipeline");
    assert_metric_has_label("fallback_calls_total", "fallback", "metrics_pipeline");
}
