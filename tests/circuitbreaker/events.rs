use guardrail::circuitbreaker::CircuitBreakerEvent;
use guardrail::core::ResilienceEvent;
use guardrail::{CircuitBreaker, CircuitState, ManualClock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn transitions_are_reported_in_order() {
    let clock = ManualClock::new();
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&transitions);
    let breaker = CircuitBreaker::builder()
        .failure_threshold(2)
        .open_duration(Duration::from_secs(10))
        .clock(clock.clone())
        .on_state_transition(move |from, to| seen.lock().unwrap().push((from, to)))
        .build()
        .unwrap();

    breaker.record_failure();
    breaker.record_failure();
    clock.advance(Duration::from_secs(10));
    assert!(breaker.allow());
    breaker.record_success();

    assert_eq!(
        *transitions.lock().unwrap(),
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

#[test]
fn rejections_are_counted() {
    let rejected = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&rejected);
    let breaker = CircuitBreaker::builder()
        .failure_threshold(1)
        .clock(ManualClock::new())
        .on_call_rejected(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    breaker.record_failure();
    for _ in 0..3 {
        assert!(!breaker.allow());
    }
    assert_eq!(rejected.load(Ordering::SeqCst), 3);
}

#[test]
fn events_carry_the_breaker_name() {
    let targets = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&targets);
    let breaker = CircuitBreaker::builder()
        .name("payments")
        .failure_threshold(1)
        .clock(ManualClock::new())
        .on_event(move |event: &CircuitBreakerEvent| {
            seen.lock()
                .unwrap()
                .push((event.event_type(), event.target().to_string()));
        })
        .build()
        .unwrap();

    breaker.record_failure();

    let targets = targets.lock().unwrap();
    assert!(targets.iter().all(|(_, target)| target == "payments"));
    assert!(targets.iter().any(|(kind, _)| *kind == "state_transition"));
}

#[test]
fn force_open_and_reset() {
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder()
        .clock(clock.clone())
        .build()
        .unwrap();

    breaker.force_open();
    assert!(breaker.is_open());
    assert!(!breaker.allow());

    breaker.reset();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(breaker.allow());
}
