//! Stop strategies: whether a rejected attempt ends the execution.

use crate::attempt::Attempt;
use crate::error::StrategyError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Decides, given the just-completed attempt, whether retrying must stop.
pub trait StopStrategy<V, E>: Send + Sync + fmt::Debug {
    fn should_stop(&self, attempt: &Attempt<V, E>) -> bool;
}

impl<V, E, S> StopStrategy<V, E> for Arc<S>
where
    S: StopStrategy<V, E> + ?Sized,
{
    fn should_stop(&self, attempt: &Attempt<V, E>) -> bool {
        (**self).should_stop(attempt)
    }
}

/// Never stops; the rejection predicate alone ends the loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NeverStop;

impl<V, E> StopStrategy<V, E> for NeverStop {
    fn should_stop(&self, _attempt: &Attempt<V, E>) -> bool {
        false
    }
}

/// Stops once `max_attempt_number` attempts have been made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopAfterAttempt {
    max_attempt_number: u64,
}

impl<V, E> StopStrategy<V, E> for StopAfterAttempt {
    fn should_stop(&self, attempt: &Attempt<V, E>) -> bool {
        attempt.attempt_number() >= self.max_attempt_number
    }
}

/// Stops once the elapsed time since the first attempt reaches `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopAfterDelay {
    max_delay: Duration,
}

impl<V, E> StopStrategy<V, E> for StopAfterDelay {
    fn should_stop(&self, attempt: &Attempt<V, E>) -> bool {
        attempt.delay_since_first_attempt() >= self.max_delay
    }
}

pub fn never() -> NeverStop {
    NeverStop
}

/// Allow at most `max_attempt_number` attempts in total. Must be >= 1.
pub fn after_attempt(max_attempt_number: u64) -> Result<StopAfterAttempt, StrategyError> {
    if max_attempt_number == 0 {
        return Err(StrategyError::InvalidMaxAttempts(max_attempt_number));
    }
    Ok(StopAfterAttempt { max_attempt_number })
}

/// Give up on the first rejected attempt that ends `max_delay` or later after the first began.
pub fn after_delay(max_delay: Duration) -> StopAfterDelay {
    StopAfterDelay { max_delay }
}
