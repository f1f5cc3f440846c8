//! Error types for the retry engine
use crate::attempt::Attempt;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// An attempt exceeded its time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("attempt timed out after {elapsed:?} (limit: {limit:?})")]
pub struct TimeoutError {
    pub elapsed: Duration,
    pub limit: Duration,
}

/// The operation panicked while producing or polling its future.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("attempt panicked: {message}")]
pub struct PanicError {
    pub message: String,
}

/// A wait or an in-flight attempt was cancelled from outside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("retry interrupted by cancellation")]
pub struct InterruptedError;

/// The executor running a time-limited attempt dropped it before it finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("attempt was dropped by its executor before completing")]
pub struct AbandonedError;

/// Failure cause recorded on a failed [`Attempt`].
#[derive(Debug, Clone)]
pub enum AttemptError<E> {
    /// The wrapped operation returned an error
    Operation(E),
    /// The attempt time limiter gave up waiting
    Timeout(TimeoutError),
    /// The operation panicked
    Panicked(PanicError),
    /// The attempt was cut short by external cancellation
    Interrupted(InterruptedError),
    /// The executor dropped the attempt's task; never produced by cancellation
    Abandoned(AbandonedError),
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(e) => write!(f, "{}", e),
            Self::Timeout(e) => write!(f, "{}", e),
            Self::Panicked(e) => write!(f, "{}", e),
            Self::Interrupted(e) => write!(f, "{}", e),
            Self::Abandoned(e) => write!(f, "{}", e),
        }
    }
}

impl<E: StdError + 'static> StdError for AttemptError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.payload())
    }
}

impl<E> AttemptError<E> {
    /// Check if the operation itself failed
    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }

    /// Check if this cause is a time-limit expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if the operation panicked
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    /// Check if the attempt was cut short by cancellation
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    /// Check if the executor dropped the attempt before it finished
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned(_))
    }

    /// Borrow the operation error if present.
    pub fn as_operation(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Get the operation error if this is an `Operation` variant
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Access timeout details as (elapsed, limit).
    pub fn timeout_details(&self) -> Option<(Duration, Duration)> {
        match self {
            Self::Timeout(t) => Some((t.elapsed, t.limit)),
            _ => None,
        }
    }
}

impl<E: StdError + 'static> AttemptError<E> {
    /// The error carried by this cause, as a trait object.
    pub fn payload(&self) -> &(dyn StdError + 'static) {
        match self {
            Self::Operation(e) => e,
            Self::Timeout(e) => e,
            Self::Panicked(e) => e,
            Self::Interrupted(e) => e,
            Self::Abandoned(e) => e,
        }
    }

    /// Find the first error of type `T` in this cause.
    ///
    /// The payload is checked first, then each error in its `source()` chain.
    pub fn find<T: StdError + 'static>(&self) -> Option<&T> {
        let mut current: Option<&(dyn StdError + 'static)> = Some(self.payload());
        while let Some(err) = current {
            if let Some(found) = err.downcast_ref::<T>() {
                return Some(found);
            }
            current = err.source();
        }
        None
    }

    /// Check whether this cause is, or wraps, an error of type `T`.
    pub fn is<T: StdError + 'static>(&self) -> bool {
        self.find::<T>().is_some()
    }
}

/// Final state of an execution that gave up.
#[derive(Debug)]
pub struct Termination<V, E> {
    attempts: u64,
    last_attempt: Attempt<V, E>,
    interrupted: bool,
}

impl<V, E> Termination<V, E> {
    pub(crate) fn stopped(attempts: u64, last_attempt: Attempt<V, E>) -> Self {
        Self { attempts, last_attempt, interrupted: false }
    }

    pub(crate) fn interrupted(attempts: u64, last_attempt: Attempt<V, E>) -> Self {
        Self { attempts, last_attempt, interrupted: true }
    }

    /// Number of attempts made before giving up.
    pub fn number_of_failed_attempts(&self) -> u64 {
        self.attempts
    }

    /// The attempt that ended the execution.
    pub fn last_failed_attempt(&self) -> &Attempt<V, E> {
        &self.last_attempt
    }

    pub fn into_last_failed_attempt(self) -> Attempt<V, E> {
        self.last_attempt
    }

    /// True when cancellation, not the stop strategy, ended the execution.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }
}

/// Outcome of a retry execution that did not produce an accepted value.
#[derive(Debug)]
pub enum RetryError<V, E> {
    /// The final attempt failed and no rejection condition matched it
    Failed(AttemptError<E>),
    /// The stop strategy or a cancellation ended retrying
    Terminated(Termination<V, E>),
}

impl<V, E: fmt::Display> fmt::Display for RetryError<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(cause) => write!(f, "{}", cause),
            Self::Terminated(t) if t.interrupted => write!(
                f,
                "retrying was interrupted after {} attempts",
                t.attempts
            ),
            Self::Terminated(t) => write!(
                f,
                "retrying failed to complete successfully after {} attempts",
                t.attempts
            ),
        }
    }
}

impl<V, E> StdError for RetryError<V, E>
where
    V: fmt::Debug,
    E: StdError + 'static,
{
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Failed(cause) => Some(cause),
            Self::Terminated(t) => {
                t.last_attempt.failure().ok().map(|cause| cause as &(dyn StdError + 'static))
            }
        }
    }
}

impl<V, E> RetryError<V, E> {
    /// Check if retrying gave up (stopped or interrupted)
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }

    /// Check if an external cancellation ended the execution
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Terminated(t) if t.interrupted)
    }

    /// Borrow the termination details if present.
    pub fn termination(&self) -> Option<&Termination<V, E>> {
        match self {
            Self::Terminated(t) => Some(t),
            Self::Failed(_) => None,
        }
    }

    /// The failure cause of the last attempt, if it failed.
    pub fn last_cause(&self) -> Option<&AttemptError<E>> {
        match self {
            Self::Failed(cause) => Some(cause),
            Self::Terminated(t) => t.last_attempt.failure().ok(),
        }
    }

    /// Get the operation error behind the last attempt, if there is one.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Failed(cause) => cause.into_operation(),
            Self::Terminated(t) => {
                t.last_attempt.into_outcome().err().and_then(AttemptError::into_operation)
            }
        }
    }
}

/// Invalid strategy parameters, reported by the strategy factories.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    #[error("max attempt number must be >= 1 (got {0})")]
    InvalidMaxAttempts(u64),
    #[error("maximum ({maximum:?}) must be > minimum ({minimum:?})")]
    InvalidRandomRange { minimum: Duration, maximum: Duration },
    #[error("multiplier must be > 0 and < maximum wait ({maximum_ms}ms), got {multiplier}")]
    InvalidMultiplier { multiplier: u64, maximum_ms: u64 },
    #[error("initial sleep time must be >= 0 (got {0}ms)")]
    NegativeInitialWait(i64),
    #[error("must have at least one wait strategy")]
    EmptyComposite,
    #[error("time limit must be greater than zero")]
    ZeroTimeLimit,
}

/// Errors produced while assembling a [`crate::Retryer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("a wait strategy has already been set")]
    WaitStrategyAlreadySet,
    #[error("a stop strategy has already been set")]
    StopStrategyAlreadySet,
    #[error("a block strategy has already been set")]
    BlockStrategyAlreadySet,
    #[error("an attempt time limiter has already been set")]
    TimeLimiterAlreadySet,
}
