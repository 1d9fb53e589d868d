//! Property tests for retry backoff.
//!
//! Invariants tested:
//! - Exponential delays never decrease and never exceed the cap
//! - Jittered delays stay within the randomization band and the cap
//! - The attempt count never exceeds max_attempts

use guardrail::retry::{ExponentialBackoff, ExponentialRandomBackoff, IntervalFunction};
use guardrail::{AttemptContext, Pipeline, RetryOrchestrator};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::runtime::Builder;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn exponential_is_monotonic_and_capped(
        base_ms in 1u64..5_000,
        cap_ms in 1u64..120_000,
        attempts in 1u32..80,
    ) {
        let cap = Duration::from_millis(cap_ms);
        let backoff = ExponentialBackoff::new(Duration::from_millis(base_ms)).max_interval(cap);

        let mut previous = Duration::ZERO;
        for attempt in 1..=attempts {
            let delay = backoff.next_interval(attempt);
            prop_assert!(delay >= previous, "attempt {attempt}: {delay:?} < {previous:?}");
            prop_assert!(delay <= cap);
            previous = delay;
        }
    }

    #[test]
    fn jitter_stays_in_band(
        base_ms in 1u64..2_000,
        factor in 0.0f64..=1.0,
        attempt in 1u32..10,
    ) {
        let cap = Duration::from_secs(60);
        let plain = ExponentialBackoff::new(Duration::from_millis(base_ms)).next_interval(attempt);
        let jittered = ExponentialRandomBackoff::new(Duration::from_millis(base_ms), factor)
            .next_interval(attempt);

        prop_assert!(jittered <= cap);
        prop_assert!(jittered.as_secs_f64() >= plain.as_secs_f64() * (1.0 - factor) - 1e-6);
        prop_assert!(jittered.as_secs_f64() <= plain.as_secs_f64() * (1.0 + factor) + 1e-6);
    }

    #[test]
    fn attempts_never_exceed_the_limit(max_attempts in 1u32..8, succeed_on in 1u32..12) {
        let rt = Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        let succeeded = rt.block_on(async {
            let pipeline = Pipeline::<(), ()>::builder("property")
                .retry(
                    RetryOrchestrator::builder()
                        .max_attempts(max_attempts)
                        .exponential_backoff(Duration::from_millis(10)),
                )
                .build()
                .unwrap();
            let counter = Arc::clone(&calls);
            pipeline
                .execute(move |ctx: AttemptContext| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let ok = ctx.attempt() >= succeed_on;
                    async move { if ok { Ok(()) } else { Err(()) } }
                })
                .await
                .is_ok()
        });

        let calls = calls.load(Ordering::SeqCst);
        prop_assert!(calls <= max_attempts);
        prop_assert_eq!(succeeded, succeed_on <= max_attempts);
        prop_assert_eq!(calls, succeed_on.min(max_attempts));
    }
}
