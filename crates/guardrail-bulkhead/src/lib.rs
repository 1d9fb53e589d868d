//! Bulkhead: caps concurrent calls to one dependency and queues a bounded
//! number of callers behind them.
//!
//! - at most `max_concurrent` callers hold an [`AdmissionTicket`] at once;
//! - at most `max_queued` callers wait for one, served in arrival order;
//! - anyone beyond that is rejected straight away.
//!
//! Tickets give their slot back when dropped, so a slot cannot leak even if
//! the call panics or its future is dropped. A caller dropped (or
//! cancelled) while queued gives its queue position back.
//!
//! ```rust
//! use guardrail_bulkhead::Bulkhead;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bulkhead = Bulkhead::builder()
//!     .name("users-api")
//!     .max_concurrent(1)
//!     .max_queued(0)
//!     .build()
//!     .unwrap();
//!
//! let ticket = bulkhead.admit().await.unwrap();
//! assert!(bulkhead.admit().await.unwrap_err().is_rejected());
//!
//! bulkhead.release(ticket);
//! assert!(bulkhead.admit().await.is_ok());
//! # }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;

pub use config::{BulkheadConfig, BulkheadConfigBuilder};
pub use error::BulkheadError;
pub use events::BulkheadEvent;
pub use layer::{BulkheadLayer, BulkheadService};

mod config;
mod error;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// Shared bulkhead handle. Clones share slots and queue.
#[derive(Clone)]
pub struct Bulkhead {
    // tokio's semaphore hands released permits to waiters in FIFO order.
    semaphore: Arc<Semaphore>,
    shared: Arc<Shared>,
}

struct Shared {
    queued: AtomicUsize,
    config: BulkheadConfig,
}

impl Bulkhead {
    pub fn builder() -> BulkheadConfigBuilder {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            metrics::describe_counter!(
                "bulkhead_calls_total",
                "Calls permitted, rejected or cancelled by the bulkhead"
            );
            metrics::describe_gauge!("bulkhead_active_calls", "Calls currently holding a slot");
            metrics::describe_gauge!("bulkhead_queued_calls", "Calls waiting for a slot");
            metrics::describe_histogram!(
                "bulkhead_wait_duration_seconds",
                "Time spent queued before getting a slot"
            );
        });
        BulkheadConfigBuilder::new()
    }

    pub(crate) fn new(config: BulkheadConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            shared: Arc::new(Shared {
                queued: AtomicUsize::new(0),
                config,
            }),
        }
    }

    pub fn config(&self) -> &BulkheadConfig {
        &self.shared.config
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Calls currently holding a slot.
    pub fn active_count(&self) -> usize {
        self.shared.config.max_concurrent - self.semaphore.available_permits()
    }

    /// Calls currently waiting for a slot.
    pub fn queued_count(&self) -> usize {
        self.shared.queued.load(Ordering::Acquire)
    }

    /// Takes a slot, waiting in the queue if needed.
    ///
    /// Fails immediately with [`BulkheadError::Rejected`] when all slots are
    /// taken and the queue is full. Dropping the returned future while it
    /// waits leaves the queue.
    pub async fn admit(&self) -> Result<AdmissionTicket, BulkheadError> {
        let config = &self.shared.config;
        let started = config.clock.now();

        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => return Ok(self.permitted(permit, started)),
            Err(TryAcquireError::NoPermits) => {}
            Err(TryAcquireError::Closed) => return Err(self.rejected()),
        }

        let Some(slot) = self.join_queue(started) else {
            return Err(self.rejected());
        };
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| self.rejected())?;
        slot.admitted();
        Ok(self.permitted(permit, started))
    }

    /// Like [`admit`](Self::admit), but gives up with
    /// [`BulkheadError::Cancelled`] once `cancel` fires.
    pub async fn admit_until_cancelled(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AdmissionTicket, BulkheadError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BulkheadError::Cancelled),
            admitted = self.admit() => admitted,
        }
    }

    /// Gives a slot back. Equivalent to dropping the ticket.
    pub fn release(&self, ticket: AdmissionTicket) {
        drop(ticket);
    }

    /// A tower layer that routes calls through this bulkhead.
    pub fn layer(&self) -> BulkheadLayer {
        BulkheadLayer::new(self.clone())
    }

    fn join_queue(&self, started: Instant) -> Option<QueueSlot<'_>> {
        let config = &self.shared.config;
        let max_queued = config.max_queued;
        let previous = self
            .shared
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| {
                (queued < max_queued).then_some(queued + 1)
            })
            .ok()?;
        let queued = previous + 1;

        config.event_listeners.emit(&BulkheadEvent::CallQueued {
            target: config.name.clone(),
            timestamp: started,
            queued,
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(bulkhead = %config.name, queued, "call queued");
        #[cfg(feature = "metrics")]
        gauge!("bulkhead_queued_calls", "bulkhead" => config.name.clone()).set(queued as f64);

        Some(QueueSlot {
            bulkhead: self,
            started,
            admitted: false,
        })
    }

    fn permitted(&self, permit: OwnedSemaphorePermit, started: Instant) -> AdmissionTicket {
        let config = &self.shared.config;
        let now = config.clock.now();
        let waited = now.saturating_duration_since(started);
        let active = self.active_count();

        config.event_listeners.emit(&BulkheadEvent::CallPermitted {
            target: config.name.clone(),
            timestamp: now,
            active,
            waited,
        });
        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_total", "bulkhead" => config.name.clone(), "outcome" => "permitted")
                .increment(1);
            gauge!("bulkhead_active_calls", "bulkhead" => config.name.clone()).set(active as f64);
            histogram!("bulkhead_wait_duration_seconds", "bulkhead" => config.name.clone())
                .record(waited.as_secs_f64());
        }

        AdmissionTicket {
            permit: Some(permit),
            bulkhead: self.clone(),
            admitted_at: now,
        }
    }

    fn rejected(&self) -> BulkheadError {
        let config = &self.shared.config;
        config.event_listeners.emit(&BulkheadEvent::CallRejected {
            target: config.name.clone(),
            timestamp: config.clock.now(),
            max_concurrent: config.max_concurrent,
            max_queued: config.max_queued,
        });
        #[cfg(feature = "tracing")]
        tracing::warn!(
            bulkhead = %config.name,
            max_concurrent = config.max_concurrent,
            max_queued = config.max_queued,
            "bulkhead full, call rejected"
        );
        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_total", "bulkhead" => config.name.clone(), "outcome" => "rejected")
            .increment(1);

        BulkheadError::Rejected {
            name: config.name.clone(),
            max_concurrent: config.max_concurrent,
            max_queued: config.max_queued,
        }
    }
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.shared.config.name)
            .field("active", &self.active_count())
            .field("queued", &self.queued_count())
            .finish()
    }
}

/// A place in the wait queue, given back on drop.
struct QueueSlot<'a> {
    bulkhead: &'a Bulkhead,
    started: Instant,
    admitted: bool,
}

impl QueueSlot<'_> {
    fn admitted(mut self) {
        self.admitted = true;
    }
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        let shared = &self.bulkhead.shared;
        let remaining = shared.queued.fetch_sub(1, Ordering::AcqRel) - 1;
        let config = &shared.config;
        #[cfg(feature = "metrics")]
        gauge!("bulkhead_queued_calls", "bulkhead" => config.name.clone()).set(remaining as f64);
        #[cfg(not(feature = "metrics"))]
        let _ = remaining;

        if !self.admitted {
            let now = config.clock.now();
            config.event_listeners.emit(&BulkheadEvent::WaitCancelled {
                target: config.name.clone(),
                timestamp: now,
                waited: now.saturating_duration_since(self.started),
            });
            #[cfg(feature = "metrics")]
            counter!("bulkhead_calls_total", "bulkhead" => config.name.clone(), "outcome" => "cancelled")
                .increment(1);
        }
    }
}

/// Proof of holding one bulkhead slot. Dropping it releases the slot.
#[must_use = "dropping the ticket releases the slot immediately"]
pub struct AdmissionTicket {
    permit: Option<OwnedSemaphorePermit>,
    bulkhead: Bulkhead,
    admitted_at: Instant,
}

impl AdmissionTicket {
    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        drop(self.permit.take());
        let config = &self.bulkhead.shared.config;
        let now = config.clock.now();
        config.event_listeners.emit(&BulkheadEvent::CallReleased {
            target: config.name.clone(),
            timestamp: now,
            held: now.saturating_duration_since(self.admitted_at),
        });
        #[cfg(feature = "metrics")]
        gauge!("bulkhead_active_calls", "bulkhead" => config.name.clone())
            .set(self.bulkhead.active_count() as f64);
    }
}

impl fmt::Debug for AdmissionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionTicket")
            .field("bulkhead", &self.bulkhead.name())
            .field("admitted_at", &self.admitted_at)
            .finish()
    }
}
