//! Per-attempt time limits with cooperative cancellation.
//!
//! A [`TimeoutGuard`] races one attempt against the guard's clock. The
//! attempt is handed a child of the caller's cancellation token. When the
//! limit elapses, the guard cancels that child token, drops the attempt and
//! reports a timeout. Work the attempt spawned can watch the token and
//! wind down; the guard does not wait for it.
//!
//! If the attempt finishes in the same poll as the deadline fires, the
//! attempt's result wins.
//!
//! ```rust
//! use guardrail_core::{AttemptOutcome, CancellationToken};
//! use guardrail_timelimiter::TimeoutGuard;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let guard = TimeoutGuard::builder()
//!     .timeout(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//!
//! let outcome: AttemptOutcome<&str, ()> = guard
//!     .run_with_timeout(
//!         |token| async move {
//!             tokio::select! {
//!                 _ = token.cancelled() => AttemptOutcome::Cancelled,
//!                 _ = tokio::time::sleep(Duration::from_secs(60)) => AttemptOutcome::Success("late"),
//!             }
//!         },
//!         &CancellationToken::new(),
//!     )
//!     .await;
//! assert_eq!(outcome, AttemptOutcome::TimedOut { after: Duration::from_secs(10) });
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use guardrail_core::AttemptOutcome;
#[cfg(feature = "metrics")]
use metrics::counter;
use tokio_util::sync::CancellationToken;

pub use config::{TimeLimiterConfig, TimeLimiterConfigBuilder};
pub use error::TimeLimiterError;
pub use events::TimeLimiterEvent;

mod config;
mod error;
mod events;

/// Applies a fixed time limit to each attempt it runs.
#[derive(Clone)]
pub struct TimeoutGuard {
    config: Arc<TimeLimiterConfig>,
}

impl TimeoutGuard {
    pub fn builder() -> TimeLimiterConfigBuilder {
        TimeLimiterConfigBuilder::new()
    }

    pub(crate) fn new(config: TimeLimiterConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &TimeLimiterConfig {
        &self.config
    }

    /// Runs one attempt under the time limit.
    ///
    /// `attempt` receives the token it should watch. Caller cancellation
    /// through `cancel` yields [`AttemptOutcome::Cancelled`] and the
    /// deadline yields [`AttemptOutcome::TimedOut`]; otherwise the attempt's
    /// own outcome is returned unchanged.
    pub async fn run_with_timeout<T, E, F, Fut>(
        &self,
        attempt: F,
        cancel: &CancellationToken,
    ) -> AttemptOutcome<T, E>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = AttemptOutcome<T, E>>,
    {
        match self.call(attempt, cancel).await {
            Ok(outcome) => outcome,
            Err(TimeLimiterError::Timeout { after }) => AttemptOutcome::TimedOut { after },
            Err(TimeLimiterError::Cancelled) => AttemptOutcome::Cancelled,
        }
    }

    /// Runs any future under the time limit.
    pub async fn call<F, Fut>(
        &self,
        f: F,
        cancel: &CancellationToken,
    ) -> Result<Fut::Output, TimeLimiterError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future,
    {
        let clock = &self.config.clock;
        let timeout = self.config.timeout;
        let attempt_token = cancel.child_token();
        let started = clock.now();
        let deadline = clock.sleep(timeout);
        let fut = f(attempt_token.clone());

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TimeLimiterError::Cancelled),
            output = fut => Ok(output),
            _ = deadline => Err(TimeLimiterError::Timeout { after: timeout }),
        };
        if result.is_err() {
            attempt_token.cancel();
        }

        let now = clock.now();
        let duration = now.saturating_duration_since(started);
        let name = &self.config.name;
        match &result {
            Ok(_) => {
                self.config
                    .event_listeners
                    .emit(&TimeLimiterEvent::Completed {
                        target: name.clone(),
                        timestamp: now,
                        duration,
                    });
                #[cfg(feature = "metrics")]
                counter!("timelimiter_calls_total", "timelimiter" => name.clone(), "outcome" => "completed").increment(1);
            }
            Err(TimeLimiterError::Timeout { .. }) => {
                self.config.event_listeners.emit(&TimeLimiterEvent::Timeout {
                    target: name.clone(),
                    timestamp: now,
                    timeout,
                });
                #[cfg(feature = "tracing")]
                tracing::warn!(guard = %name, ?timeout, "attempt timed out");
                #[cfg(feature = "metrics")]
                counter!("timelimiter_calls_total", "timelimiter" => name.clone(), "outcome" => "timeout").increment(1);
            }
            Err(TimeLimiterError::Cancelled) => {
                self.config
                    .event_listeners
                    .emit(&TimeLimiterEvent::Cancelled {
                        target: name.clone(),
                        timestamp: now,
                        duration,
                    });
                #[cfg(feature = "tracing")]
                tracing::debug!(guard = %name, ?duration, "attempt cancelled by caller");
                #[cfg(feature = "metrics")]
                counter!("timelimiter_calls_total", "timelimiter" => name.clone(), "outcome" => "cancelled").increment(1);
            }
        }
        result
    }
}

impl fmt::Debug for TimeoutGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutGuard")
            .field("name", &self.config.name)
            .field("timeout", &self.config.timeout)
            .finish()
    }
}
