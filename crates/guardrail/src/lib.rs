//! Resilience pipeline for outbound calls.
//!
//! `guardrail` composes the policy crates into one entry point. A call made
//! through a [`Pipeline`] is:
//!
//! 1. admitted by the **bulkhead**, or rejected when all slots and the wait
//!    queue are taken;
//! 2. run by the **retry orchestrator**, which for every attempt asks the
//!    **circuit breaker** for a permit, bounds the attempt with the
//!    **timeout guard**, and backs off exponentially between retryable
//!    failures;
//! 3. handed to the **fallback resolver**, which substitutes the designated
//!    value for any failure.
//!
//! Every policy is optional except retry, which defaults to one attempt.
//!
//! # Example
//!
//! ```rust
//! use guardrail::{
//!     AttemptContext, Bulkhead, CircuitBreaker, FallbackResolver, Pipeline, Resolved,
//!     RetryOrchestrator, TimeoutGuard,
//! };
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let pipeline = Pipeline::<String, std::io::Error>::builder("users-api")
//!     .bulkhead(Bulkhead::builder().max_concurrent(10).max_queued(5))
//!     .retry(
//!         RetryOrchestrator::builder()
//!             .max_attempts(4)
//!             .exponential_backoff(Duration::from_secs(1)),
//!     )
//!     .circuit_breaker(
//!         CircuitBreaker::builder()
//!             .failure_threshold(3)
//!             .open_duration(Duration::from_secs(30)),
//!     )
//!     .time_limiter(TimeoutGuard::builder().timeout(Duration::from_secs(10)))
//!     .fallback(FallbackResolver::builder().value("guest".to_string()))
//!     .build()
//!     .unwrap();
//!
//! let resolved = pipeline
//!     .execute(|ctx: AttemptContext| async move {
//!         Ok::<_, std::io::Error>(format!("profile fetched on attempt {}", ctx.attempt()))
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(resolved, Resolved::Success("profile fetched on attempt 1".to_string()));
//! # }
//! ```
//!
//! # Outcomes
//!
//! The caller gets either the genuine success or the fallback value, always
//! distinguishable through [`Resolved`]. Raw failures surface as
//! [`PolicyError`] when no fallback is configured, when the fallback's handle
//! predicate excludes the failure, or when the call opts into strict mode
//! with [`ExecuteOptions::strict`].
//!
//! # Observability
//!
//! Policies report through their own event listeners. A pipeline also
//! translates retries, circuit transitions, rejections, timeouts and
//! fallbacks into [`PolicyEvent`]s for its observers; with the `tracing`
//! feature, [`TracingObserver`] logs them.
//!
//! # Feature flags
//!
//! - `tracing`: debug/info/warn logs from every policy and [`TracingObserver`]
//! - `metrics`: counters and gauges from every policy plus
//!   `pipeline_calls_total`

pub use guardrail_bulkhead as bulkhead;
pub use guardrail_circuitbreaker as circuitbreaker;
pub use guardrail_core as core;
pub use guardrail_fallback as fallback;
pub use guardrail_retry as retry;
pub use guardrail_timelimiter as timelimiter;

pub use guardrail_bulkhead::{AdmissionTicket, Bulkhead, BulkheadError};
pub use guardrail_circuitbreaker::{BreakerPermit, CircuitBreaker, CircuitState};
pub use guardrail_core::{
    AttemptContext, AttemptOutcome, CancellationToken, Clock, ConfigError, ErrorClass,
    FnClassifier, ManualClock, OutcomeClassifier, OutcomeKind, PolicyError, TokioClock,
};
pub use guardrail_fallback::{FallbackResolver, Resolved};
pub use guardrail_retry::{RetryOrchestrator, RetryPolicy};
pub use guardrail_timelimiter::TimeoutGuard;

pub use layer::{PipelineLayer, PipelineService};
#[cfg(feature = "tracing")]
pub use observe::TracingObserver;
pub use observe::{PolicyEvent, PolicyEventKind, PolicyObserver};
pub use operation::{Operation, ServiceOperation};
pub use pipeline::{ExecuteOptions, Pipeline, PipelineBuilder};
pub use settings::{
    BulkheadSettings, CircuitBreakerSettings, PipelineSettings, RetrySettings, TimeoutSettings,
};
pub use stage::{BulkheadStage, Next, RetryStage, Stage};

mod layer;
mod observe;
mod operation;
mod pipeline;
mod settings;
mod stage;
