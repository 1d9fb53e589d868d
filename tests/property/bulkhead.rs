//! Property tests for the bulkhead.
//!
//! Invariants tested:
//! - Running calls never exceed max_concurrent
//! - Exactly max_concurrent + max_queued of a burst are admitted

use futures::future::join_all;
use guardrail::{AttemptContext, Bulkhead, Pipeline};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Builder;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn burst_is_bounded(
        max_concurrent in 1usize..12,
        max_queued in 0usize..8,
        burst in 1usize..40,
    ) {
        let rt = Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let admitted = rt.block_on(async {
            let pipeline = Pipeline::<(), ()>::builder("property")
                .bulkhead(
                    Bulkhead::builder()
                        .max_concurrent(max_concurrent)
                        .max_queued(max_queued),
                )
                .build()
                .unwrap();
            let operation = {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                move |_ctx: AttemptContext| {
                    let running = Arc::clone(&running);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, ()>(())
                    }
                }
            };

            join_all((0..burst).map(|_| pipeline.execute(&operation)))
                .await
                .into_iter()
                .filter(|r| r.is_ok())
                .count()
        });

        prop_assert!(peak.load(Ordering::SeqCst) <= max_concurrent);
        prop_assert_eq!(admitted, burst.min(max_concurrent + max_queued));
    }
}
