//! Deserialisable pipeline settings.
//!
//! Loading is left to the application; any serde format works. Durations are
//! whole milliseconds and every field has a default, so a partial document
//! only overrides what it names:
//!
//! ```rust
//! use guardrail::PipelineSettings;
//! use std::time::Duration;
//!
//! let settings: PipelineSettings = serde_json::from_str(
//!     r#"{ "target": "users-api", "retry": { "max_attempts": 3 } }"#,
//! )
//! .unwrap();
//! assert_eq!(settings.retry.max_attempts, 3);
//! assert_eq!(settings.retry.backoff_base(), Duration::from_secs(1));
//! assert_eq!(settings.timeout.timeout(), Duration::from_secs(10));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Name of the protected dependency.
    pub target: String,
    pub retry: RetrySettings,
    pub timeout: TimeoutSettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub bulkhead: BulkheadSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            target: String::from("default"),
            retry: RetrySettings::default(),
            timeout: TimeoutSettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            bulkhead: BulkheadSettings::default(),
        }
    }
}

/// Defaults: 4 attempts (3 retries), 1s base doubling per retry, 60s cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetrySettings {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_base_ms: 1_000,
            max_backoff_ms: 60_000,
        }
    }
}

/// Default: 10s per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub timeout_ms: u64,
}

impl TimeoutSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// Defaults: open after 3 consecutive failures, stay open for 30s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub open_duration_ms: u64,
}

impl CircuitBreakerSettings {
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_duration_ms: 30_000,
        }
    }
}

/// Defaults: 10 concurrent, 5 queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadSettings {
    pub max_concurrent: usize,
    pub max_queued: usize,
}

impl Default for BulkheadSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_queued: 5,
        }
    }
}
