//! Wait strategies: how long to pause before the next attempt.
//!
//! Every strategy is a pure function of the just-completed (rejected) [`Attempt`] and its own
//! fixed configuration. Attempt numbers are 1-based, so the first computed wait follows
//! attempt 1.
//!
//! | factory | wait after attempt `n` |
//! |---|---|
//! | [`no_wait`] | `0` |
//! | [`fixed`] | `delay` |
//! | [`random`] | uniform in `[minimum, maximum)` |
//! | [`incrementing`] | `max(0, initial + increment * (n - 1))` |
//! | [`exponential_with`] | `min(maximum, round(multiplier * 2^n))` |
//! | [`fibonacci_with`] | `min(maximum, multiplier * fib(n))` |
//! | [`join`] | sum of the sub-strategies |
//! | [`error_wait`] | `f(cause)` when the failure is a `T`, else `0` |
//!
//! Arithmetic saturates: overflow clamps to the strategy's maximum (or to `u64::MAX`
//! milliseconds when there is none) instead of wrapping.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use retrying::{wait, Attempt, WaitStrategy};
//!
//! let strategy = wait::fibonacci_with(1, Duration::from_secs(60)).unwrap();
//! let attempt: Attempt<(), std::io::Error> = Attempt::success((), 6, Duration::ZERO);
//! assert_eq!(strategy.compute_wait(&attempt), Duration::from_millis(8));
//! ```

use crate::attempt::Attempt;
use crate::error::StrategyError;
use rand::{rng, Rng};
use std::error::Error as StdError;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound used by the unbounded exponential and Fibonacci factories.
pub const UNBOUNDED_WAIT: Duration = Duration::from_millis(u64::MAX);

/// Computes the delay before the next attempt.
pub trait WaitStrategy<V, E>: Send + Sync + fmt::Debug {
    fn compute_wait(&self, attempt: &Attempt<V, E>) -> Duration;
}

impl<V, E, W> WaitStrategy<V, E> for Arc<W>
where
    W: WaitStrategy<V, E> + ?Sized,
{
    fn compute_wait(&self, attempt: &Attempt<V, E>) -> Duration {
        (**self).compute_wait(attempt)
    }
}

fn as_millis_saturated(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

/// Always the same delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWait {
    delay: Duration,
}

impl<V, E> WaitStrategy<V, E> for FixedWait {
    fn compute_wait(&self, _attempt: &Attempt<V, E>) -> Duration {
        self.delay
    }
}

/// Retry immediately.
pub fn no_wait() -> FixedWait {
    FixedWait { delay: Duration::ZERO }
}

/// Wait `delay` before every retry.
pub fn fixed(delay: Duration) -> FixedWait {
    FixedWait { delay }
}

/// Uniformly random delay in `[minimum, maximum)`, millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomWait {
    minimum: u64,
    maximum: u64,
}

impl RandomWait {
    /// Draw a delay from a caller-supplied RNG (for deterministic tests).
    pub fn compute_with_rng<R: Rng>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.random_range(self.minimum..self.maximum))
    }
}

impl<V, E> WaitStrategy<V, E> for RandomWait {
    fn compute_wait(&self, _attempt: &Attempt<V, E>) -> Duration {
        let mut rng = rng();
        self.compute_with_rng(&mut rng)
    }
}

/// Random delay in `[minimum, maximum)`. Fails unless `maximum > minimum`.
pub fn random(minimum: Duration, maximum: Duration) -> Result<RandomWait, StrategyError> {
    let (min_ms, max_ms) = (as_millis_saturated(minimum), as_millis_saturated(maximum));
    if max_ms <= min_ms {
        return Err(StrategyError::InvalidRandomRange { minimum, maximum });
    }
    Ok(RandomWait { minimum: min_ms, maximum: max_ms })
}

/// Random delay in `[0, maximum)`.
pub fn random_up_to(maximum: Duration) -> Result<RandomWait, StrategyError> {
    random(Duration::ZERO, maximum)
}

/// Linearly growing (or shrinking) delay, floored at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementingWait {
    initial: u64,
    increment: i64,
}

impl<V, E> WaitStrategy<V, E> for IncrementingWait {
    fn compute_wait(&self, attempt: &Attempt<V, E>) -> Duration {
        let steps = i128::from(attempt.attempt_number().saturating_sub(1));
        let millis = i128::from(self.initial) + i128::from(self.increment) * steps;
        Duration::from_millis(millis.clamp(0, i128::from(u64::MAX)) as u64)
    }
}

/// `initial + increment * (attempt - 1)`, never below zero.
pub fn incrementing(initial: Duration, increment: Duration) -> IncrementingWait {
    let increment = i64::try_from(as_millis_saturated(increment)).unwrap_or(i64::MAX);
    IncrementingWait { initial: as_millis_saturated(initial), increment }
}

/// Millisecond form of [`incrementing`] that also accepts a negative step.
///
/// Fails when `initial_ms` is negative.
pub fn incrementing_millis(
    initial_ms: i64,
    increment_ms: i64,
) -> Result<IncrementingWait, StrategyError> {
    if initial_ms < 0 {
        return Err(StrategyError::NegativeInitialWait(initial_ms));
    }
    Ok(IncrementingWait { initial: initial_ms as u64, increment: increment_ms })
}

fn check_multiplier(multiplier: u64, maximum: Duration) -> Result<u64, StrategyError> {
    let maximum_ms = as_millis_saturated(maximum);
    if multiplier == 0 || multiplier >= maximum_ms {
        return Err(StrategyError::InvalidMultiplier { multiplier, maximum_ms });
    }
    Ok(maximum_ms)
}

/// `round(multiplier * 2^attempt)` milliseconds, capped at a maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialWait {
    multiplier: u64,
    maximum: u64,
}

impl<V, E> WaitStrategy<V, E> for ExponentialWait {
    fn compute_wait(&self, attempt: &Attempt<V, E>) -> Duration {
        // f64 keeps huge exponents finite or +inf; either way the cap applies below.
        let exp = 2f64.powf(attempt.attempt_number() as f64);
        let result = (self.multiplier as f64 * exp).round();
        if result >= self.maximum as f64 {
            Duration::from_millis(self.maximum)
        } else {
            Duration::from_millis(result as u64)
        }
    }
}

/// Exponential wait with multiplier 1 and no upper bound.
pub fn exponential() -> ExponentialWait {
    ExponentialWait { multiplier: 1, maximum: u64::MAX }
}

/// Exponential wait with multiplier 1, capped at `maximum`.
pub fn exponential_up_to(maximum: Duration) -> Result<ExponentialWait, StrategyError> {
    exponential_with(1, maximum)
}

/// Exponential wait; requires `0 < multiplier < maximum` (in milliseconds).
pub fn exponential_with(
    multiplier: u64,
    maximum: Duration,
) -> Result<ExponentialWait, StrategyError> {
    let maximum = check_multiplier(multiplier, maximum)?;
    Ok(ExponentialWait { multiplier, maximum })
}

/// `multiplier * fib(attempt)` milliseconds, capped at a maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FibonacciWait {
    multiplier: u64,
    maximum: u64,
}

impl FibonacciWait {
    /// Iterative Fibonacci that stops as soon as the scaled value passes `self.maximum`.
    fn scaled_fib(&self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        let limit = self.maximum / self.multiplier;
        let (mut prev_prev, mut prev) = (0u64, 1u64);
        for _ in 2..=n {
            if prev > limit {
                return self.maximum;
            }
            match prev.checked_add(prev_prev) {
                Some(next) => {
                    prev_prev = prev;
                    prev = next;
                }
                None => return self.maximum,
            }
        }
        prev.checked_mul(self.multiplier).map_or(self.maximum, |v| v.min(self.maximum))
    }
}

impl<V, E> WaitStrategy<V, E> for FibonacciWait {
    fn compute_wait(&self, attempt: &Attempt<V, E>) -> Duration {
        Duration::from_millis(self.scaled_fib(attempt.attempt_number()))
    }
}

/// Fibonacci wait with multiplier 1 and no upper bound.
pub fn fibonacci() -> FibonacciWait {
    FibonacciWait { multiplier: 1, maximum: u64::MAX }
}

/// Fibonacci wait with multiplier 1, capped at `maximum`.
pub fn fibonacci_up_to(maximum: Duration) -> Result<FibonacciWait, StrategyError> {
    fibonacci_with(1, maximum)
}

/// Fibonacci wait; requires `0 < multiplier < maximum` (in milliseconds).
pub fn fibonacci_with(multiplier: u64, maximum: Duration) -> Result<FibonacciWait, StrategyError> {
    let maximum = check_multiplier(multiplier, maximum)?;
    Ok(FibonacciWait { multiplier, maximum })
}

/// Sum of an ordered, non-empty list of strategies.
pub struct CompositeWait<V, E> {
    strategies: Vec<Arc<dyn WaitStrategy<V, E>>>,
}

impl<V, E> Clone for CompositeWait<V, E> {
    fn clone(&self) -> Self {
        Self { strategies: self.strategies.clone() }
    }
}

impl<V, E> fmt::Debug for CompositeWait<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeWait").field("strategies", &self.strategies).finish()
    }
}

impl<V, E> WaitStrategy<V, E> for CompositeWait<V, E> {
    fn compute_wait(&self, attempt: &Attempt<V, E>) -> Duration {
        self.strategies
            .iter()
            .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.compute_wait(attempt)))
    }
}

/// Combine strategies by adding their delays. Fails on an empty list.
pub fn join<V, E>(
    strategies: Vec<Arc<dyn WaitStrategy<V, E>>>,
) -> Result<CompositeWait<V, E>, StrategyError> {
    if strategies.is_empty() {
        return Err(StrategyError::EmptyComposite);
    }
    Ok(CompositeWait { strategies })
}

/// Delay chosen by a function of the failure, when the failure is (or wraps) a `T`.
pub struct ErrorWait<T, F> {
    function: F,
    _error: PhantomData<fn(&T)>,
}

impl<T, F: Clone> Clone for ErrorWait<T, F> {
    fn clone(&self) -> Self {
        Self { function: self.function.clone(), _error: PhantomData }
    }
}

impl<T, F> fmt::Debug for ErrorWait<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorWait")
            .field("error_type", &std::any::type_name::<T>())
            .field("function", &"<fn>")
            .finish()
    }
}

impl<V, E, T, F> WaitStrategy<V, E> for ErrorWait<T, F>
where
    E: StdError + 'static,
    T: StdError + 'static,
    F: Fn(&T) -> Duration + Send + Sync,
{
    fn compute_wait(&self, attempt: &Attempt<V, E>) -> Duration {
        attempt
            .failure()
            .ok()
            .and_then(|cause| cause.find::<T>())
            .map_or(Duration::ZERO, |err| (self.function)(err))
    }
}

/// Wait `function(err)` when the last failure is a `T`; otherwise don't wait.
pub fn error_wait<T, F>(function: F) -> ErrorWait<T, F>
where
    T: StdError + 'static,
    F: Fn(&T) -> Duration + Send + Sync,
{
    ErrorWait { function, _error: PhantomData }
}
