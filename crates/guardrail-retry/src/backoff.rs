//! Delay strategies between attempts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Computes the wait after a failed attempt.
///
/// `attempt` is the 1-based number of the attempt that just failed, so the
/// first retry waits `next_interval(1)`.
pub trait IntervalFunction: Send + Sync {
    fn next_interval(&self, attempt: u32) -> Duration;
}

/// `initial × multiplier^attempt`, capped at `max_interval`.
///
/// With the defaults (multiplier 2, one second initial interval) the waits
/// before retries 1, 2 and 3 are 2s, 4s and 8s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: Duration::from_secs(60),
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        // Non-finite or oversized products saturate at the cap.
        Duration::try_from_secs_f64(secs)
            .map(|interval| interval.min(self.max_interval))
            .unwrap_or(self.max_interval)
    }
}

/// [`ExponentialBackoff`] with each wait scaled by a random factor in
/// `[1 - randomization, 1 + randomization]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialRandomBackoff {
    inner: ExponentialBackoff,
    randomization_factor: f64,
}

impl ExponentialRandomBackoff {
    pub fn new(initial_interval: Duration, randomization_factor: f64) -> Self {
        Self {
            inner: ExponentialBackoff::new(initial_interval),
            randomization_factor: randomization_factor.clamp(0.0, 1.0),
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.inner = self.inner.multiplier(multiplier);
        self
    }

    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.inner = self.inner.max_interval(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn next_interval(&self, attempt: u32) -> Duration {
        let base = self.inner.next_interval(attempt);
        let spread = self.randomization_factor * (2.0 * rand::random::<f64>() - 1.0);
        base.mul_f64(1.0 + spread).min(self.inner.max_interval)
    }
}

/// The same wait before every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: u32) -> Duration {
        self.interval
    }
}

/// Closure-backed interval function.
pub struct FnInterval<F> {
    f: Arc<F>,
}

impl<F> FnInterval<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> Clone for FnInterval<F> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<F> fmt::Debug for FnInterval<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInterval").finish_non_exhaustive()
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: u32) -> Duration {
        (self.f)(attempt)
    }
}
