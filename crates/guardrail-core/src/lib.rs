//! Shared building blocks for guardrail policies.
//!
//! Every policy crate depends on this one for:
//! - the [`AttemptOutcome`] model and [`OutcomeClassifier`]s
//! - the unified [`PolicyError`] and builder [`ConfigError`]
//! - the event system ([`EventListeners`], [`FnListener`])
//! - the injectable [`Clock`] ([`TokioClock`], [`ManualClock`])
//! - [`AttemptContext`], which carries the attempt number and cancellation
//!   token down the chain

pub mod clock;
pub mod context;
pub mod error;
pub mod events;
pub mod outcome;

pub use clock::{default_clock, Clock, ManualClock, SharedClock, TokioClock};
pub use context::AttemptContext;
pub use error::{ConfigError, PolicyError};
pub use events::{BoxedEventListener, EventListener, EventListeners, FnListener, ResilienceEvent};
pub use outcome::{
    AttemptOutcome, DefaultClassifier, ErrorClass, FnClassifier, OutcomeClassifier, OutcomeKind,
};

pub use tokio_util::sync::CancellationToken;
