//! Time source used by every policy.
//!
//! Policies never read the system clock or call `tokio::time` directly; they
//! go through an injected [`Clock`]. [`TokioClock`] is the production clock
//! and also follows tokio's paused test time. [`ManualClock`] only moves when
//! a test calls [`ManualClock::advance`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::oneshot;

/// Source of the current time and of timers.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;

    /// Returns a future that completes once `duration` has elapsed on this
    /// clock.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

pub type SharedClock = Arc<dyn Clock>;

/// The clock policies use unless a builder is given another one.
pub fn default_clock() -> SharedClock {
    Arc::new(TokioClock)
}

/// Clock backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// A clock that stands still until told to move.
///
/// Clones share the same timeline. Sleeps register a timer that fires when
/// [`advance`](ManualClock::advance) moves past its deadline; a zero-length
/// sleep completes immediately.
#[derive(Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<Timeline>>,
}

struct Timeline {
    origin: Instant,
    elapsed: Duration,
    timers: Vec<Timer>,
}

struct Timer {
    deadline: Duration,
    wake: oneshot::Sender<()>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Duration::ZERO,
            timers: Vec::new(),
        }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn timeline(&self) -> MutexGuard<'_, Timeline> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves time forward and fires every timer that is now due, earliest
    /// deadline first.
    pub fn advance(&self, by: Duration) {
        let mut due = {
            let mut timeline = self.timeline();
            timeline.elapsed += by;
            let now = timeline.elapsed;
            let (due, pending): (Vec<_>, Vec<_>) = timeline
                .timers
                .drain(..)
                .partition(|timer| timer.deadline <= now);
            timeline.timers = pending;
            due
        };
        due.sort_by_key(|timer| timer.deadline);
        for timer in due {
            let _ = timer.wake.send(());
        }
    }

    /// Total time advanced since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.timeline().elapsed
    }

    /// Number of sleeps still waiting on this clock.
    pub fn pending_timers(&self) -> usize {
        self.timeline()
            .timers
            .iter()
            .filter(|timer| !timer.wake.is_closed())
            .count()
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timeline = self.timeline();
        f.debug_struct("ManualClock")
            .field("elapsed", &timeline.elapsed)
            .field("timers", &timeline.timers.len())
            .finish()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let timeline = self.timeline();
        timeline.origin + timeline.elapsed
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        if duration.is_zero() {
            return Box::pin(futures::future::ready(()));
        }
        let (wake, fired) = oneshot::channel();
        {
            let mut timeline = self.timeline();
            // Sleeps dropped before their deadline leave closed timers behind.
            timeline.timers.retain(|timer| !timer.wake.is_closed());
            let deadline = timeline.elapsed + duration;
            timeline.timers.push(Timer { deadline, wake });
        }
        Box::pin(async move {
            if fired.await.is_err() {
                // Every handle to the clock is gone, so time can never reach
                // the deadline.
                std::future::pending::<()>().await;
            }
        })
    }
}
