//! Block strategies: how a computed wait is actually performed.
//!
//! Every implementation must honor the cancellation token: a token cancelled before or during
//! the wait ends it with [`InterruptedError`] so the retryer can terminate instead of retrying.
//! [`InstantBlock`] and [`TrackingBlock`] make tests fast and deterministic.

use crate::error::InterruptedError;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Suspends the current task for a computed duration.
pub trait BlockStrategy: Send + Sync + fmt::Debug {
    fn block<'a>(
        &'a self,
        duration: Duration,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), InterruptedError>>;
}

impl<B> BlockStrategy for Arc<B>
where
    B: BlockStrategy + ?Sized,
{
    fn block<'a>(
        &'a self,
        duration: Duration,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), InterruptedError>> {
        (**self).block(duration, cancel)
    }
}

/// Production strategy: a tokio sleep raced against the cancellation token.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepBlock;

impl BlockStrategy for SleepBlock {
    fn block<'a>(
        &'a self,
        duration: Duration,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), InterruptedError>> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(InterruptedError),
                _ = tokio::time::sleep(duration) => Ok(()),
            }
        })
    }
}

/// Test strategy that returns immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantBlock;

impl BlockStrategy for InstantBlock {
    fn block<'a>(
        &'a self,
        _duration: Duration,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), InterruptedError>> {
        let result = if cancel.is_cancelled() { Err(InterruptedError) } else { Ok(()) };
        Box::pin(async move { result })
    }
}

/// Test strategy that records every requested duration without sleeping
#[derive(Debug, Clone, Default)]
pub struct TrackingBlock {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl TrackingBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl BlockStrategy for TrackingBlock {
    fn block<'a>(
        &'a self,
        duration: Duration,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), InterruptedError>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(duration);
        InstantBlock.block(duration, cancel)
    }
}

/// The default strategy.
pub fn sleep() -> SleepBlock {
    SleepBlock
}
