//! Retryer: the retry execution loop.
//!
//! Semantics, per execution of [`Retryer::call`]:
//! 1. Invoke the operation through the attempt time limiter. A returned value becomes a success
//!    [`Attempt`]; an error, timeout, or panic becomes a failure `Attempt`. The attempt number
//!    and the elapsed time since the first attempt are stamped on it.
//! 2. Notify every listener, in registration order.
//! 3. If the rejection predicate does not reject the attempt, return its outcome: the value, or
//!    `RetryError::Failed` carrying the original cause.
//! 4. If the stop strategy says stop, return `RetryError::Terminated`.
//! 5. Otherwise compute the wait, block for it, and go again with the next attempt number.
//!
//! Invariants:
//! - Attempt numbers start at 1 and increase by one; elapsed time never decreases.
//! - Cancellation (during an attempt or a wait) terminates with the attempt count reached so
//!   far; it is never converted into another attempt.
//! - The loop has no built-in bound: "never stop" plus "reject everything" retries forever.
//! - A token that is already cancelled ends the execution before the operation is invoked.
//!
//! The operation's futures may borrow from the caller unless the time limiter `L` needs to
//! spawn them; [`FixedTimeLimit`](crate::time_limit::FixedTimeLimit) only accepts `'static`
//! futures.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use retrying::{stop, wait, Retryer, RetryError};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("oops")]
//! struct MyErr;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let retryer = Retryer::<u32, MyErr>::builder()
//!     .retry_if_failure()
//!     .with_stop_strategy(stop::after_attempt(3).unwrap())
//!     .with_wait_strategy(wait::fixed(Duration::from_millis(1)))
//!     .build()
//!     .unwrap();
//! let result = retryer.call(|| async { Err(MyErr) }).await;
//! assert!(matches!(result, Err(RetryError::Terminated(_))));
//! # });
//! ```

use crate::attempt::Attempt;
use crate::block::{BlockStrategy, SleepBlock};
use crate::error::{
    AttemptError, BuildError, InterruptedError, PanicError, RetryError, Termination,
};
use crate::listener::RetryListener;
use crate::rejection::RejectionPredicate;
use crate::stop::{NeverStop, StopStrategy};
use crate::time_limit::{AttemptTimeLimiter, NoTimeLimit};
use crate::wait::{self, WaitStrategy};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Immutable, reusable retry engine.
///
/// Cloning is cheap (policies are shared behind `Arc`), and one instance may run any number of
/// concurrent executions: each owns its attempt counter and start time.
///
/// `L` is the attempt time limiter; [`NoTimeLimit`] unless the builder was given another.
pub struct Retryer<V, E, L = NoTimeLimit> {
    time_limiter: Arc<L>,
    stop: Arc<dyn StopStrategy<V, E>>,
    wait: Arc<dyn WaitStrategy<V, E>>,
    block: Arc<dyn BlockStrategy>,
    rejection: RejectionPredicate<V, E>,
    listeners: Arc<[Arc<dyn RetryListener<V, E>>]>,
}

impl<V, E, L> Clone for Retryer<V, E, L> {
    fn clone(&self) -> Self {
        Self {
            time_limiter: self.time_limiter.clone(),
            stop: self.stop.clone(),
            wait: self.wait.clone(),
            block: self.block.clone(),
            rejection: self.rejection.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

impl<V, E, L: fmt::Debug> fmt::Debug for Retryer<V, E, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retryer")
            .field("time_limiter", &self.time_limiter)
            .field("stop", &self.stop)
            .field("wait", &self.wait)
            .field("block", &self.block)
            .field("rejection", &self.rejection)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn panicked<V, E>(payload: Box<dyn Any + Send>) -> Result<V, AttemptError<E>> {
    Err(AttemptError::Panicked(PanicError { message: panic_message(&*payload) }))
}

impl<V, E> Retryer<V, E>
where
    V: Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    /// Construct a new builder with defaults.
    pub fn builder() -> RetryerBuilder<V, E> {
        RetryerBuilder::new()
    }
}

impl<V, E, L> Retryer<V, E, L>
where
    V: Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    /// Run `operation` until an outcome is accepted or retrying terminates.
    pub async fn call<'a, Op, Fut>(&self, operation: Op) -> Result<V, RetryError<V, E>>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'a,
        L: AttemptTimeLimiter<'a, V, E>,
    {
        self.call_with_cancel(operation, &CancellationToken::new()).await
    }

    /// Like [`Retryer::call`], but `cancel` interrupts an in-flight attempt or wait.
    pub async fn call_with_cancel<'a, Op, Fut>(
        &self,
        mut operation: Op,
        cancel: &CancellationToken,
    ) -> Result<V, RetryError<V, E>>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'a,
        L: AttemptTimeLimiter<'a, V, E>,
    {
        let start = Instant::now();
        let mut attempt_number: u64 = 1;

        loop {
            let (outcome, interrupted) = if cancel.is_cancelled() {
                (Err(AttemptError::Interrupted(InterruptedError)), true)
            } else {
                let invocation = Self::invoke(&mut operation);
                let limited = AttemptTimeLimiter::<'a, V, E>::call(&*self.time_limiter, invocation);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        (Err(AttemptError::Interrupted(InterruptedError)), true)
                    }
                    outcome = limited => (outcome, false),
                }
            };

            let elapsed = start.elapsed();
            let attempt = match outcome {
                Ok(value) => Attempt::success(value, attempt_number, elapsed),
                Err(cause) => Attempt::failed(cause, attempt_number, elapsed),
            };

            for listener in self.listeners.iter() {
                listener.on_attempt(&attempt);
            }

            if interrupted {
                tracing::debug!(attempt = attempt_number, "retry interrupted during attempt");
                return Err(RetryError::Terminated(Termination::interrupted(
                    attempt_number,
                    attempt,
                )));
            }

            if !self.rejection.rejects(&attempt) {
                return attempt.into_outcome().map_err(RetryError::Failed);
            }

            if self.stop.should_stop(&attempt) {
                tracing::debug!(
                    attempt = attempt_number,
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "stop strategy ended retrying"
                );
                return Err(RetryError::Terminated(Termination::stopped(attempt_number, attempt)));
            }

            let delay = self.wait.compute_wait(&attempt);
            tracing::debug!(
                attempt = attempt_number,
                wait_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "attempt rejected; waiting before retry"
            );

            if self.block.block(delay, cancel).await.is_err() {
                tracing::debug!(attempt = attempt_number, "retry interrupted during wait");
                return Err(RetryError::Terminated(Termination::interrupted(
                    attempt_number,
                    attempt,
                )));
            }

            attempt_number = attempt_number.saturating_add(1);
        }
    }

    /// Bundle `operation` with this retryer; each `call` runs a fresh execution.
    pub fn wrap<Op>(&self, operation: Op) -> RetryingCall<V, E, Op, L> {
        RetryingCall { retryer: self.clone(), operation }
    }

    /// Normalize one invocation: errors and panics become failure causes.
    fn invoke<'a, Op, Fut>(operation: &mut Op) -> BoxFuture<'a, Result<V, AttemptError<E>>>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'a,
    {
        match panic::catch_unwind(AssertUnwindSafe(&mut *operation)) {
            Ok(fut) => AssertUnwindSafe(fut)
                .catch_unwind()
                .map(|caught| match caught {
                    Ok(result) => result.map_err(AttemptError::Operation),
                    Err(payload) => panicked(payload),
                })
                .boxed(),
            Err(payload) => future::ready(panicked(payload)).boxed(),
        }
    }
}

/// An operation bound to a [`Retryer`].
pub struct RetryingCall<V, E, Op, L = NoTimeLimit> {
    retryer: Retryer<V, E, L>,
    operation: Op,
}

impl<V, E, Op, L: fmt::Debug> fmt::Debug for RetryingCall<V, E, Op, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingCall")
            .field("retryer", &self.retryer)
            .field("operation", &"<operation>")
            .finish()
    }
}

impl<V, E, Op, Fut, L> RetryingCall<V, E, Op, L>
where
    V: Send + 'static,
    E: StdError + Send + Sync + 'static,
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send,
{
    /// Run the wrapped operation under the retryer.
    pub async fn call<'a>(&mut self) -> Result<V, RetryError<V, E>>
    where
        Fut: 'a,
        L: AttemptTimeLimiter<'a, V, E>,
    {
        self.retryer.call(&mut self.operation).await
    }
}

/// Builder for [`Retryer`].
///
/// Each policy may be set at most once; a second assignment is reported by [`build`].
/// Rejection conditions and listeners accumulate.
///
/// Defaults: no time limit, never stop, no wait, [`SleepBlock`], reject nothing.
///
/// [`build`]: RetryerBuilder::build
pub struct RetryerBuilder<V, E, L = NoTimeLimit> {
    time_limiter: L,
    time_limiter_set: bool,
    stop: Option<Arc<dyn StopStrategy<V, E>>>,
    wait: Option<Arc<dyn WaitStrategy<V, E>>>,
    block: Option<Arc<dyn BlockStrategy>>,
    rejection: RejectionPredicate<V, E>,
    listeners: Vec<Arc<dyn RetryListener<V, E>>>,
    conflict: Option<BuildError>,
}

impl<V, E, L: fmt::Debug> fmt::Debug for RetryerBuilder<V, E, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryerBuilder")
            .field("time_limiter", &self.time_limiter)
            .field("stop", &self.stop)
            .field("wait", &self.wait)
            .field("block", &self.block)
            .field("rejection", &self.rejection)
            .field("listeners", &self.listeners.len())
            .field("conflict", &self.conflict)
            .finish()
    }
}

fn assign<T: ?Sized>(
    slot: &mut Option<Arc<T>>,
    value: Arc<T>,
    conflict: &mut Option<BuildError>,
    on_conflict: BuildError,
) {
    if slot.is_some() {
        conflict.get_or_insert(on_conflict);
    } else {
        *slot = Some(value);
    }
}

impl<V, E> RetryerBuilder<V, E>
where
    V: Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            time_limiter: NoTimeLimit,
            time_limiter_set: false,
            stop: None,
            wait: None,
            block: None,
            rejection: RejectionPredicate::never(),
            listeners: Vec::new(),
            conflict: None,
        }
    }
}

impl<V, E, L> RetryerBuilder<V, E, L>
where
    V: Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    pub fn with_wait_strategy<W>(mut self, strategy: W) -> Self
    where
        W: WaitStrategy<V, E> + 'static,
    {
        let strategy: Arc<dyn WaitStrategy<V, E>> = Arc::new(strategy);
        assign(&mut self.wait, strategy, &mut self.conflict, BuildError::WaitStrategyAlreadySet);
        self
    }

    pub fn with_stop_strategy<S>(mut self, strategy: S) -> Self
    where
        S: StopStrategy<V, E> + 'static,
    {
        let strategy: Arc<dyn StopStrategy<V, E>> = Arc::new(strategy);
        assign(&mut self.stop, strategy, &mut self.conflict, BuildError::StopStrategyAlreadySet);
        self
    }

    pub fn with_block_strategy<B>(mut self, strategy: B) -> Self
    where
        B: BlockStrategy + 'static,
    {
        let strategy: Arc<dyn BlockStrategy> = Arc::new(strategy);
        assign(&mut self.block, strategy, &mut self.conflict, BuildError::BlockStrategyAlreadySet);
        self
    }

    /// Set the attempt time limiter. The limiter type becomes part of the built [`Retryer`].
    pub fn with_attempt_time_limiter<T>(self, limiter: T) -> RetryerBuilder<V, E, T>
    where
        T: AttemptTimeLimiter<'static, V, E> + 'static,
    {
        let mut conflict = self.conflict;
        if self.time_limiter_set {
            conflict.get_or_insert(BuildError::TimeLimiterAlreadySet);
        }
        RetryerBuilder {
            time_limiter: limiter,
            time_limiter_set: true,
            stop: self.stop,
            wait: self.wait,
            block: self.block,
            rejection: self.rejection,
            listeners: self.listeners,
            conflict,
        }
    }

    /// Register a listener; all listeners run, in registration order.
    pub fn with_retry_listener<R>(mut self, listener: R) -> Self
    where
        R: RetryListener<V, E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Retry on any failure (operation error, timeout, or panic).
    pub fn retry_if_failure(mut self) -> Self {
        self.rejection = self.rejection.or_any_failure();
        self
    }

    /// Retry when the operation panics.
    pub fn retry_if_panic(mut self) -> Self {
        self.rejection = self.rejection.or_panic();
        self
    }

    /// Retry on failures that are, or wrap, an error of type `T`.
    pub fn retry_if_error_of<T: StdError + 'static>(mut self) -> Self {
        self.rejection = self.rejection.or_error_of::<T>();
        self
    }

    /// Retry when the attempt time limit expires.
    pub fn retry_if_timeout(mut self) -> Self {
        self.rejection = self.rejection.or_timeout();
        self
    }

    /// Retry on failures whose cause satisfies `predicate`.
    pub fn retry_if_error<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AttemptError<E>) -> bool + Send + Sync + 'static,
    {
        self.rejection = self.rejection.or_error(predicate);
        self
    }

    /// Retry on successful values that satisfy `predicate`.
    pub fn retry_if_result<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        self.rejection = self.rejection.or_result(predicate);
        self
    }

    /// Build the retryer, reporting the first duplicate policy assignment.
    pub fn build(self) -> Result<Retryer<V, E, L>, BuildError> {
        if let Some(conflict) = self.conflict {
            return Err(conflict);
        }
        Ok(Retryer {
            time_limiter: Arc::new(self.time_limiter),
            stop: self.stop.unwrap_or_else(|| Arc::new(NeverStop)),
            wait: self.wait.unwrap_or_else(|| Arc::new(wait::no_wait())),
            block: self.block.unwrap_or_else(|| Arc::new(SleepBlock)),
            rejection: self.rejection,
            listeners: self.listeners.into(),
        })
    }
}

impl<V, E> Default for RetryerBuilder<V, E>
where
    V: Send + 'static,
    E: StdError + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
