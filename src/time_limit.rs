//! Per-attempt time limits.
//!
//! [`NoTimeLimit`] awaits the attempt in place, so the attempt may borrow from the caller.
//! [`FixedTimeLimit`] hands the attempt to a caller-supplied [`Executor`], waits for it with a
//! deadline and aborts the task when the deadline passes. Abort is best effort: the task stops
//! at its next suspension point, and a result that arrives after the deadline is discarded.
//! Spawned work must be `'static`, so `FixedTimeLimit` only limits owned attempts.
//!
//! The executor is borrowed, never owned: its lifecycle belongs to the caller.

use crate::error::{AbandonedError, AttemptError, StrategyError, TimeoutError};
use futures::future::{AbortHandle, Abortable, BoxFuture};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Runs detached units of work for [`FixedTimeLimit`].
pub trait Executor: Send + Sync + fmt::Debug {
    fn execute(&self, task: BoxFuture<'static, ()>);
}

impl Executor for tokio::runtime::Handle {
    fn execute(&self, task: BoxFuture<'static, ()>) {
        drop(self.spawn(task));
    }
}

impl<X> Executor for Arc<X>
where
    X: Executor + ?Sized,
{
    fn execute(&self, task: BoxFuture<'static, ()>) {
        (**self).execute(task)
    }
}

/// Wraps a single invocation with an optional deadline.
///
/// `'a` is the lifetime of the attempt future. A limiter implemented for every `'a` accepts
/// attempts that borrow from the caller; one implemented only for `'static` accepts owned
/// attempts only.
pub trait AttemptTimeLimiter<'a, V, E>: Send + Sync + fmt::Debug {
    fn call(
        &self,
        attempt: BoxFuture<'a, Result<V, AttemptError<E>>>,
    ) -> BoxFuture<'a, Result<V, AttemptError<E>>>;
}

impl<'a, V, E, L> AttemptTimeLimiter<'a, V, E> for Arc<L>
where
    L: AttemptTimeLimiter<'a, V, E> + ?Sized,
{
    fn call(
        &self,
        attempt: BoxFuture<'a, Result<V, AttemptError<E>>>,
    ) -> BoxFuture<'a, Result<V, AttemptError<E>>> {
        (**self).call(attempt)
    }
}

/// `None` awaits the attempt without a deadline.
impl<'a, V, E, L> AttemptTimeLimiter<'a, V, E> for Option<L>
where
    L: AttemptTimeLimiter<'a, V, E>,
{
    fn call(
        &self,
        attempt: BoxFuture<'a, Result<V, AttemptError<E>>>,
    ) -> BoxFuture<'a, Result<V, AttemptError<E>>> {
        match self {
            Some(limiter) => limiter.call(attempt),
            None => attempt,
        }
    }
}

/// Await the attempt without a deadline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTimeLimit;

impl<'a, V, E> AttemptTimeLimiter<'a, V, E> for NoTimeLimit {
    fn call(
        &self,
        attempt: BoxFuture<'a, Result<V, AttemptError<E>>>,
    ) -> BoxFuture<'a, Result<V, AttemptError<E>>> {
        attempt
    }
}

/// Run the attempt on an executor and give up after `limit`.
#[derive(Debug, Clone)]
pub struct FixedTimeLimit {
    limit: Duration,
    executor: Arc<dyn Executor>,
}

impl FixedTimeLimit {
    /// Inspect the configured limit.
    pub fn limit(&self) -> Duration {
        self.limit
    }
}

/// Aborts the spawned attempt when the limiter future finishes or is dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<V, E> AttemptTimeLimiter<'static, V, E> for FixedTimeLimit
where
    V: Send + 'static,
    E: Send + 'static,
{
    fn call(
        &self,
        attempt: BoxFuture<'static, Result<V, AttemptError<E>>>,
    ) -> BoxFuture<'static, Result<V, AttemptError<E>>> {
        let limit = self.limit;
        let executor = Arc::clone(&self.executor);
        Box::pin(async move {
            let start = Instant::now();
            let (tx, rx) = oneshot::channel();
            let (handle, registration) = AbortHandle::new_pair();
            let _guard = AbortOnDrop(handle);

            let task = Abortable::new(
                async move {
                    // receiver may already be gone after a timeout
                    let _ = tx.send(attempt.await);
                },
                registration,
            );
            executor.execute(Box::pin(async move {
                let _ = task.await;
            }));

            match tokio::time::timeout(limit, rx).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) => {
                    tracing::warn!("executor dropped the attempt before it finished");
                    Err(AttemptError::Abandoned(AbandonedError))
                }
                Err(_) => {
                    tracing::debug!(
                        limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        "attempt exceeded its time limit; aborting"
                    );
                    Err(AttemptError::Timeout(TimeoutError { elapsed: start.elapsed(), limit }))
                }
            }
        })
    }
}

/// Await every attempt without a deadline (the default).
pub fn none() -> NoTimeLimit {
    NoTimeLimit
}

/// Limit every attempt to `limit`, running it on `executor`. A zero limit is rejected.
pub fn fixed<X>(limit: Duration, executor: X) -> Result<FixedTimeLimit, StrategyError>
where
    X: Executor + 'static,
{
    if limit.is_zero() {
        return Err(StrategyError::ZeroTimeLimit);
    }
    Ok(FixedTimeLimit { limit, executor: Arc::new(executor) })
}
