//! Retry orchestration with exponential backoff.
//!
//! A [`RetryOrchestrator`] drives the attempt loop for one call:
//!
//! 1. ask the circuit breaker (if any) for a permit, and stop with
//!    [`AttemptOutcome::CircuitOpen`] when refused;
//! 2. run the attempt, bounded by the timeout guard (if any);
//! 3. on success, report it to the breaker and return;
//! 4. on a transient failure or timeout, report a failure to the breaker and
//!    either give up (last attempt) or wait `backoff(attempt)` and go again;
//! 5. on a fatal failure, return at once without telling the breaker.
//!
//! Backoff waits run on the orchestrator's clock and end early, with
//! [`AttemptOutcome::Cancelled`], if the caller cancels.
//!
//! ```rust
//! use guardrail_core::{AttemptContext, AttemptOutcome, CancellationToken};
//! use guardrail_retry::RetryOrchestrator;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let retry = RetryOrchestrator::builder()
//!     .name("users-api")
//!     .max_attempts(4)
//!     .exponential_backoff(Duration::from_secs(1))
//!     .on_retry(|attempt, delay, reason| {
//!         println!("retry {attempt} in {delay:?} due to {reason}");
//!     })
//!     .build()
//!     .unwrap();
//!
//! let calls = AtomicU32::new(0);
//! let ctx = AttemptContext::new("users-api", CancellationToken::new());
//! let outcome: AttemptOutcome<&str, &str> = retry
//!     .execute(&ctx, |_| {
//!         let n = calls.fetch_add(1, Ordering::SeqCst);
//!         async move {
//!             if n < 2 {
//!                 AttemptOutcome::TransientFailure("503")
//!             } else {
//!                 AttemptOutcome::Success("profile")
//!             }
//!         }
//!     })
//!     .await;
//! assert_eq!(outcome, AttemptOutcome::Success("profile"));
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use guardrail_core::{AttemptContext, AttemptOutcome};
#[cfg(feature = "metrics")]
use metrics::counter;

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;
pub use policy::RetryPolicy;

mod backoff;
mod config;
mod events;
mod policy;

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// Runs attempts until one succeeds, a non-retryable outcome occurs, or the
/// policy is exhausted.
#[derive(Clone)]
pub struct RetryOrchestrator {
    config: Arc<RetryConfig>,
}

impl RetryOrchestrator {
    pub fn builder() -> RetryConfigBuilder {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            metrics::describe_counter!(
                "retry_calls_total",
                "Calls finished by the retry orchestrator, by outcome"
            );
            metrics::describe_counter!("retry_attempts_total", "Retries scheduled after a failure");
        });
        RetryConfigBuilder::new()
    }

    pub(crate) fn new(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs the attempt loop.
    ///
    /// `attempt_fn` is called once per attempt with a context carrying the
    /// 1-based attempt number and the token the attempt should watch.
    pub async fn execute<T, E, F, Fut>(
        &self,
        ctx: &AttemptContext,
        mut attempt_fn: F,
    ) -> AttemptOutcome<T, E>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = AttemptOutcome<T, E>>,
    {
        let config = &*self.config;
        let max_attempts = config.policy.max_attempts();
        let cancel = ctx.cancellation();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                self.finish_cancelled(attempt);
                return AttemptOutcome::Cancelled;
            }

            let permit = match &config.breaker {
                Some(breaker) => match breaker.try_acquire() {
                    Some(permit) => Some(permit),
                    None => {
                        self.emit(RetryEvent::CircuitOpen {
                            target: config.name.clone(),
                            timestamp: config.clock.now(),
                            attempt,
                        });
                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "circuit_open").increment(1);
                        return AttemptOutcome::CircuitOpen;
                    }
                },
                None => None,
            };

            let attempt_ctx = ctx.with_attempt(attempt);
            let outcome = match &config.guard {
                Some(guard) => {
                    guard
                        .run_with_timeout(
                            |token| attempt_fn(attempt_ctx.with_cancellation(token)),
                            cancel,
                        )
                        .await
                }
                None => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => AttemptOutcome::Cancelled,
                        outcome = attempt_fn(attempt_ctx) => outcome,
                    }
                }
            };

            match outcome {
                AttemptOutcome::Success(value) => {
                    if let Some(permit) = permit {
                        permit.success();
                    }
                    self.emit(RetryEvent::Success {
                        target: config.name.clone(),
                        timestamp: config.clock.now(),
                        attempts: attempt,
                    });
                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "success").increment(1);
                    return AttemptOutcome::Success(value);
                }
                outcome if outcome.is_retryable() => {
                    if let AttemptOutcome::TimedOut { after } = &outcome {
                        self.emit(RetryEvent::TimedOut {
                            target: config.name.clone(),
                            timestamp: config.clock.now(),
                            attempt,
                            after: *after,
                        });
                    }
                    if let Some(permit) = permit {
                        permit.failure();
                    }
                    let reason = outcome.kind();
                    if attempt >= max_attempts {
                        self.emit(RetryEvent::Exhausted {
                            target: config.name.clone(),
                            timestamp: config.clock.now(),
                            attempts: attempt,
                            last: reason,
                        });
                        #[cfg(feature = "tracing")]
                        tracing::warn!(retry = %config.name, attempts = attempt, %reason, "retries exhausted");
                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "exhausted").increment(1);
                        return outcome;
                    }

                    let delay = config.policy.backoff(attempt);
                    self.emit(RetryEvent::Retry {
                        target: config.name.clone(),
                        timestamp: config.clock.now(),
                        attempt,
                        delay,
                        reason,
                    });
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        retry = %config.name,
                        attempt,
                        ?delay,
                        %reason,
                        "retry {} scheduled in {:?} due to {}",
                        attempt,
                        delay,
                        reason
                    );
                    #[cfg(feature = "metrics")]
                    counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

                    let waited = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => false,
                        _ = config.clock.sleep(delay) => true,
                    };
                    if !waited {
                        self.finish_cancelled(attempt);
                        return AttemptOutcome::Cancelled;
                    }
                }
                AttemptOutcome::Cancelled => {
                    drop(permit);
                    self.finish_cancelled(attempt);
                    return AttemptOutcome::Cancelled;
                }
                outcome => {
                    // Fatal failures and rejections from inner stages are not
                    // the dependency's fault as far as the breaker goes.
                    drop(permit);
                    let kind = outcome.kind();
                    self.emit(RetryEvent::NonRetryable {
                        target: config.name.clone(),
                        timestamp: config.clock.now(),
                        attempt,
                        kind,
                    });
                    #[cfg(feature = "tracing")]
                    tracing::debug!(retry = %config.name, attempt, %kind, "not retrying");
                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "non_retryable").increment(1);
                    return outcome;
                }
            }
        }
    }

    fn finish_cancelled(&self, attempt: u32) {
        let config = &*self.config;
        self.emit(RetryEvent::Cancelled {
            target: config.name.clone(),
            timestamp: config.clock.now(),
            attempt,
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(retry = %config.name, attempt, "call cancelled");
        #[cfg(feature = "metrics")]
        counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "cancelled").increment(1);
    }

    fn emit(&self, event: RetryEvent) {
        self.config.event_listeners.emit(&event);
    }
}

impl fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("name", &self.config.name)
            .field("policy", &self.config.policy)
            .field("breaker", &self.config.breaker)
            .field("guard", &self.config.guard)
            .finish()
    }
}
