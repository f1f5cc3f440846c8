//! Retry listeners: per-attempt notification hooks.
//!
//! The retryer calls every registered listener once per attempt, in registration order, right
//! after the attempt is recorded and before the rejection predicate runs. Listeners see
//! accepted, rejected, and final attempts alike and cannot influence control flow.
//!
//! A listener that panics is not caught: the panic unwinds out of [`crate::Retryer::call`].
//!
//! ```rust
//! use retrying::{Attempt, RetryListener};
//!
//! let log = |attempt: &Attempt<u32, std::io::Error>| {
//!     println!("attempt {} took {:?}", attempt.attempt_number(), attempt.delay_since_first_attempt());
//! };
//! log.on_attempt(&Attempt::success(1, 1, std::time::Duration::ZERO));
//! ```

use crate::attempt::Attempt;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Notification sink invoked after every attempt.
pub trait RetryListener<V, E>: Send + Sync {
    fn on_attempt(&self, attempt: &Attempt<V, E>);
}

impl<V, E, F> RetryListener<V, E> for F
where
    F: Fn(&Attempt<V, E>) + Send + Sync,
{
    fn on_attempt(&self, attempt: &Attempt<V, E>) {
        self(attempt)
    }
}

/// Logs each attempt through `tracing`.
///
/// Successful attempts are logged at `debug`, failures at `warn` with the cause rendered via
/// `Display`.
#[derive(Debug, Clone)]
pub struct TracingListener {
    name: &'static str,
}

impl TracingListener {
    /// `name` is attached to every event as the `operation` field.
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Default for TracingListener {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl<V, E: fmt::Display> RetryListener<V, E> for TracingListener {
    fn on_attempt(&self, attempt: &Attempt<V, E>) {
        let elapsed_ms = u64::try_from(attempt.delay_since_first_attempt().as_millis())
            .unwrap_or(u64::MAX);
        match attempt.failure() {
            Ok(cause) => tracing::warn!(
                operation = self.name,
                attempt = attempt.attempt_number(),
                elapsed_ms,
                error = %cause,
                "attempt failed"
            ),
            Err(_) => tracing::debug!(
                operation = self.name,
                attempt = attempt.attempt_number(),
                elapsed_ms,
                "attempt succeeded"
            ),
        }
    }
}

/// Snapshot of an attempt kept by [`MemoryListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt_number: u64,
    pub delay_since_first_attempt: Duration,
    pub succeeded: bool,
    /// `Display` of the failure cause, if the attempt failed.
    pub error: Option<String>,
}

/// In-memory listener that records a snapshot of every attempt.
#[derive(Debug, Clone, Default)]
pub struct MemoryListener {
    records: Arc<Mutex<Vec<AttemptRecord>>>,
}

impl MemoryListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded attempts, oldest first.
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl<V, E: fmt::Display> RetryListener<V, E> for MemoryListener {
    fn on_attempt(&self, attempt: &Attempt<V, E>) {
        let record = AttemptRecord {
            attempt_number: attempt.attempt_number(),
            delay_since_first_attempt: attempt.delay_since_first_attempt(),
            succeeded: attempt.has_result(),
            error: attempt.failure().ok().map(|cause| cause.to_string()),
        };
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}
