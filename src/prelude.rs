//! Convenient re-exports for common retrying types.
pub use crate::{
    attempt::Attempt,
    block::{BlockStrategy, SleepBlock},
    error::{AttemptError, BuildError, RetryError, StrategyError, Termination, TimeoutError},
    layer::{RetryLayer, RetryService},
    listener::{RetryListener, TracingListener},
    retry::{Retryer, RetryerBuilder},
    stop::{self, StopStrategy},
    time_limit::{self, AttemptTimeLimiter},
    wait::{self, WaitStrategy},
    CancellationToken,
};
