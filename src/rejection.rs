//! Rejection predicate: which outcomes make the retryer consider another attempt.
//!
//! Conditions are OR-combined. With no condition registered nothing is rejected, so the first
//! outcome (success or failure) is final.

use crate::attempt::Attempt;
use crate::error::{AttemptError, TimeoutError};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

type Condition<V, E> = Arc<dyn Fn(&Attempt<V, E>) -> bool + Send + Sync>;

/// OR-composition of attempt conditions.
pub struct RejectionPredicate<V, E> {
    conditions: Vec<Condition<V, E>>,
}

impl<V, E> Clone for RejectionPredicate<V, E> {
    fn clone(&self) -> Self {
        Self { conditions: self.conditions.clone() }
    }
}

impl<V: 'static, E: 'static> Default for RejectionPredicate<V, E> {
    fn default() -> Self {
        Self::never()
    }
}

impl<V, E> fmt::Debug for RejectionPredicate<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RejectionPredicate")
            .field("conditions", &self.conditions.len())
            .finish()
    }
}

impl<V, E> RejectionPredicate<V, E>
where
    V: 'static,
    E: 'static,
{
    /// Reject nothing.
    pub fn never() -> Self {
        Self { conditions: Vec::new() }
    }

    /// Add an arbitrary condition over the whole attempt.
    pub fn or<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Attempt<V, E>) -> bool + Send + Sync + 'static,
    {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Reject every failed attempt.
    pub fn or_any_failure(self) -> Self {
        self.or(|attempt| attempt.has_failure())
    }

    /// Reject attempts whose operation panicked.
    pub fn or_panic(self) -> Self {
        self.or_error(AttemptError::is_panic)
    }

    /// Reject failures whose cause satisfies `predicate`.
    pub fn or_error<F>(self, predicate: F) -> Self
    where
        F: Fn(&AttemptError<E>) -> bool + Send + Sync + 'static,
    {
        self.or(move |attempt| attempt.failure().is_ok_and(&predicate))
    }

    /// Reject successes whose value satisfies `predicate`.
    pub fn or_result<F>(self, predicate: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.or(move |attempt| attempt.result().is_ok_and(&predicate))
    }

    /// Number of registered conditions.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// True when any registered condition matches.
    pub fn rejects(&self, attempt: &Attempt<V, E>) -> bool {
        self.conditions.iter().any(|condition| condition(attempt))
    }
}

impl<V, E> RejectionPredicate<V, E>
where
    V: 'static,
    E: StdError + 'static,
{
    /// Reject failures whose cause is, or wraps, an error of type `T`.
    pub fn or_error_of<T: StdError + 'static>(self) -> Self {
        self.or_error(AttemptError::is::<T>)
    }

    /// Reject attempts that hit the time limit.
    pub fn or_timeout(self) -> Self {
        self.or_error_of::<TimeoutError>()
    }
}
