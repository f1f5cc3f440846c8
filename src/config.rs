//! Serializable retry configuration (feature `config`).
//!
//! ```rust
//! use retrying::config::RetryConfig;
//!
//! let cfg: RetryConfig = serde_json::from_str(r#"{
//!     "stop": { "kind": "after_attempt", "max_attempts": 5 },
//!     "wait": { "kind": "exponential", "multiplier": 100, "max_ms": 10000 },
//!     "retry_on": ["failure"]
//! }"#).unwrap();
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let retryer = cfg
//!     .into_builder::<u32, std::io::Error, _>(runtime.handle().clone())
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! # let _ = retryer;
//! ```

use crate::error::StrategyError;
use crate::retry::RetryerBuilder;
use crate::stop::{self, StopStrategy};
use crate::time_limit::{self, Executor, FixedTimeLimit};
use crate::wait::{self, WaitStrategy, UNBOUNDED_WAIT};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

/// Top-level retry description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub stop: StopConfig,
    #[serde(default)]
    pub wait: WaitConfig,
    /// Per-attempt time limit; unlimited when absent.
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,
    /// Conditions that make an attempt eligible for retry. Empty accepts the first outcome.
    #[serde(default)]
    pub retry_on: Vec<RetryOn>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopConfig {
    #[default]
    Never,
    AfterAttempt { max_attempts: u64 },
    AfterDelay { max_delay_ms: u64 },
}

fn default_multiplier() -> u64 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaitConfig {
    #[default]
    None,
    Fixed { delay_ms: u64 },
    Random {
        #[serde(default)]
        min_ms: u64,
        max_ms: u64,
    },
    Incrementing { initial_ms: i64, increment_ms: i64 },
    Exponential {
        #[serde(default = "default_multiplier")]
        multiplier: u64,
        #[serde(default)]
        max_ms: Option<u64>,
    },
    Fibonacci {
        #[serde(default = "default_multiplier")]
        multiplier: u64,
        #[serde(default)]
        max_ms: Option<u64>,
    },
    Join { strategies: Vec<WaitConfig> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOn {
    Failure,
    Panic,
    Timeout,
}

impl StopConfig {
    pub fn build<V, E>(&self) -> Result<Arc<dyn StopStrategy<V, E>>, StrategyError>
    where
        V: 'static,
        E: 'static,
    {
        let strategy: Arc<dyn StopStrategy<V, E>> = match *self {
            StopConfig::Never => Arc::new(stop::never()),
            StopConfig::AfterAttempt { max_attempts } => Arc::new(stop::after_attempt(max_attempts)?),
            StopConfig::AfterDelay { max_delay_ms } => {
                Arc::new(stop::after_delay(Duration::from_millis(max_delay_ms)))
            }
        };
        Ok(strategy)
    }
}

fn maximum(max_ms: Option<u64>) -> Duration {
    max_ms.map_or(UNBOUNDED_WAIT, Duration::from_millis)
}

impl WaitConfig {
    pub fn build<V, E>(&self) -> Result<Arc<dyn WaitStrategy<V, E>>, StrategyError>
    where
        V: 'static,
        E: 'static,
    {
        let strategy: Arc<dyn WaitStrategy<V, E>> = match self {
            WaitConfig::None => Arc::new(wait::no_wait()),
            WaitConfig::Fixed { delay_ms } => Arc::new(wait::fixed(Duration::from_millis(*delay_ms))),
            WaitConfig::Random { min_ms, max_ms } => Arc::new(wait::random(
                Duration::from_millis(*min_ms),
                Duration::from_millis(*max_ms),
            )?),
            WaitConfig::Incrementing { initial_ms, increment_ms } => {
                Arc::new(wait::incrementing_millis(*initial_ms, *increment_ms)?)
            }
            WaitConfig::Exponential { multiplier, max_ms } => {
                Arc::new(wait::exponential_with(*multiplier, maximum(*max_ms))?)
            }
            WaitConfig::Fibonacci { multiplier, max_ms } => {
                Arc::new(wait::fibonacci_with(*multiplier, maximum(*max_ms))?)
            }
            WaitConfig::Join { strategies } => {
                let built = strategies
                    .iter()
                    .map(WaitConfig::build::<V, E>)
                    .collect::<Result<Vec<_>, _>>()?;
                Arc::new(wait::join(built)?)
            }
        };
        Ok(strategy)
    }
}

impl RetryConfig {
    /// Produce a builder with this configuration applied.
    ///
    /// `executor` runs time-limited attempts; it is only used when `attempt_timeout_ms` is set.
    /// The time limiter is already assigned; the builder can still take listeners and extra
    /// conditions before `build`.
    pub fn into_builder<V, E, X>(
        &self,
        executor: X,
    ) -> Result<RetryerBuilder<V, E, Option<FixedTimeLimit>>, StrategyError>
    where
        V: Send + 'static,
        E: StdError + Send + Sync + 'static,
        X: Executor + 'static,
    {
        let limiter = match self.attempt_timeout_ms {
            Some(ms) => Some(time_limit::fixed(Duration::from_millis(ms), executor)?),
            None => None,
        };
        let mut builder = RetryerBuilder::new()
            .with_stop_strategy(self.stop.build::<V, E>()?)
            .with_wait_strategy(self.wait.build::<V, E>()?)
            .with_attempt_time_limiter(limiter);

        for condition in &self.retry_on {
            builder = match condition {
                RetryOn::Failure => builder.retry_if_failure(),
                RetryOn::Panic => builder.retry_if_panic(),
                RetryOn::Timeout => builder.retry_if_timeout(),
            };
        }
        Ok(builder)
    }
}
