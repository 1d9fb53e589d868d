//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - Opens exactly when the consecutive failure count reaches the threshold
//! - A success in Closed resets the streak
//! - Never admits more than one probe per half-open period

use guardrail::{CircuitBreaker, CircuitState, ManualClock};
use proptest::prelude::*;
use std::time::Duration;

fn breaker(threshold: u32, clock: &ManualClock) -> CircuitBreaker {
    CircuitBreaker::builder()
        .failure_threshold(threshold)
        .open_duration(Duration::from_secs(30))
        .clock(clock.clone())
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the state is Open iff the trailing run of failures has
    /// reached the threshold at some point since the last success.
    #[test]
    fn opens_on_consecutive_failures_only(
        threshold in 1u32..=6,
        outcomes in prop::collection::vec(any::<bool>(), 0..40),
    ) {
        let clock = ManualClock::new();
        let breaker = breaker(threshold, &clock);
        let mut streak = 0u32;
        let mut open = false;

        for failed in outcomes {
            if open {
                prop_assert!(!breaker.allow());
                continue;
            }
            prop_assert!(breaker.allow());
            if failed {
                breaker.record_failure();
                streak += 1;
                open = streak >= threshold;
            } else {
                breaker.record_success();
                streak = 0;
            }
            prop_assert_eq!(breaker.is_open(), open);
            if !open {
                prop_assert_eq!(breaker.consecutive_failures(), streak);
            }
        }
    }

    /// Property: however many callers ask after the cooldown, exactly one
    /// gets the probe.
    #[test]
    fn single_probe_per_half_open_period(callers in 1usize..50) {
        let clock = ManualClock::new();
        let breaker = breaker(1, &clock);
        breaker.record_failure();
        clock.advance(Duration::from_secs(30));

        let permits: Vec<_> = (0..callers).filter_map(|_| breaker.try_acquire()).collect();
        prop_assert_eq!(permits.len(), 1);
        prop_assert!(permits[0].is_probe());
        prop_assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    /// Property: the circuit stays open for at least the open duration.
    #[test]
    fn refuses_for_the_whole_open_period(open_secs in 1u64..120, probe_at in 0u64..120) {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::builder()
            .failure_threshold(1)
            .open_duration(Duration::from_secs(open_secs))
            .clock(clock.clone())
            .build()
            .unwrap();
        breaker.record_failure();

        clock.advance(Duration::from_secs(probe_at));
        prop_assert_eq!(breaker.allow(), probe_at >= open_secs);
    }
}
