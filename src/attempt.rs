//! The record of a single invocation.
//!
//! An [`Attempt`] is created by the [`crate::Retryer`] after every invocation and handed to
//! listeners, the rejection predicate, and the stop/wait strategies as a read-only view.
//!
//! Invariants:
//! - Exactly one of [`Attempt::has_result`] / [`Attempt::has_failure`] is true.
//! - Attempt numbers start at 1 and increase by one per invocation within an execution.
//! - `delay_since_first_attempt` is measured from the start of the first attempt and never
//!   decreases across attempts of the same execution.

use crate::error::AttemptError;
use std::time::Duration;

/// Usage error returned by the "wrong" accessor for an attempt's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttemptStateError {
    #[error("the attempt resulted in a failure, not in a result")]
    NoResult,
    #[error("the attempt resulted in a result, not in a failure")]
    NoFailure,
}

/// Outcome of one invocation, with its sequence number and elapsed time.
#[derive(Debug, Clone)]
pub struct Attempt<V, E> {
    outcome: Result<V, AttemptError<E>>,
    attempt_number: u64,
    delay_since_first_attempt: Duration,
}

impl<V, E> Attempt<V, E> {
    /// Record a successful invocation.
    pub fn success(value: V, attempt_number: u64, delay_since_first_attempt: Duration) -> Self {
        Self { outcome: Ok(value), attempt_number, delay_since_first_attempt }
    }

    /// Record a failed invocation.
    pub fn failed(
        cause: AttemptError<E>,
        attempt_number: u64,
        delay_since_first_attempt: Duration,
    ) -> Self {
        Self { outcome: Err(cause), attempt_number, delay_since_first_attempt }
    }

    pub fn has_result(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn has_failure(&self) -> bool {
        self.outcome.is_err()
    }

    /// Borrow the returned value.
    pub fn result(&self) -> Result<&V, AttemptStateError> {
        self.outcome.as_ref().map_err(|_| AttemptStateError::NoResult)
    }

    /// Borrow the failure cause.
    pub fn failure(&self) -> Result<&AttemptError<E>, AttemptStateError> {
        match &self.outcome {
            Ok(_) => Err(AttemptStateError::NoFailure),
            Err(cause) => Ok(cause),
        }
    }

    /// 1-based position of this attempt within its execution.
    pub fn attempt_number(&self) -> u64 {
        self.attempt_number
    }

    /// Time elapsed between the start of the first attempt and the end of this one.
    pub fn delay_since_first_attempt(&self) -> Duration {
        self.delay_since_first_attempt
    }

    /// Borrow the outcome as a `Result`.
    pub fn outcome(&self) -> Result<&V, &AttemptError<E>> {
        self.outcome.as_ref()
    }

    /// The value on success, the cause on failure.
    pub fn into_outcome(self) -> Result<V, AttemptError<E>> {
        self.outcome
    }
}
