#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # retrying
//!
//! A general-purpose retry engine for async Rust: run an operation repeatedly until its outcome
//! is accepted or a stop condition ends the execution.
//!
//! ## Features
//!
//! - **Wait strategies**: fixed, random, incrementing, exponential, Fibonacci, error-driven and
//!   composite delays
//! - **Stop strategies**: never, after N attempts, after an elapsed delay
//! - **Block strategies** that honor a `CancellationToken`
//! - **Per-attempt time limits** with best-effort abort of the timed-out attempt
//! - **Rejection conditions** over failures, panics, error types and returned values
//! - **Listeners** notified after every attempt, including a `tracing` one
//! - **Tower integration** via `Retryer::into_layer`
//!
//! ## Quick Start
//!
//! ```rust
//! use retrying::{stop, wait, Retryer};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let retryer = Retryer::<u32, std::io::Error>::builder()
//!         .retry_if_failure()
//!         .with_wait_strategy(wait::exponential_with(100, Duration::from_secs(5)).unwrap())
//!         .with_stop_strategy(stop::after_attempt(3).unwrap())
//!         .build()
//!         .unwrap();
//!
//!     let result = retryer.call(|| async {
//!         // Your async operation here
//!         Ok::<_, std::io::Error>(42)
//!     }).await;
//!     assert_eq!(result.unwrap(), 42);
//! }
//! ```

pub mod attempt;
pub mod block;
#[cfg(feature = "config")]
pub mod config;
pub mod error;
pub mod layer;
pub mod listener;
pub mod prelude;
pub mod rejection;
pub mod retry;
pub mod stop;
pub mod time_limit;
pub mod wait;

// Re-exports
pub use attempt::{Attempt, AttemptStateError};
pub use block::{BlockStrategy, InstantBlock, SleepBlock, TrackingBlock};
pub use error::{
    AbandonedError, AttemptError, BuildError, InterruptedError, PanicError, RetryError,
    StrategyError, Termination, TimeoutError,
};
pub use layer::{RetryLayer, RetryService};
pub use listener::{AttemptRecord, MemoryListener, RetryListener, TracingListener};
pub use rejection::RejectionPredicate;
pub use retry::{Retryer, RetryerBuilder, RetryingCall};
pub use stop::StopStrategy;
pub use time_limit::{AttemptTimeLimiter, Executor, FixedTimeLimit, NoTimeLimit};
pub use wait::WaitStrategy;
pub use tokio_util::sync::CancellationToken;
