//! Invariants checked over generated inputs.

pub mod backoff;
pub mod bulkhead;
pub mod circuit_breaker;
