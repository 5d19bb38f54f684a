//! Retry policy and politeness delays
//!
//! A single [`RetryPolicy`] is shared by the entity fetcher and the download
//! manager so both retry loops behave identically: a bounded number of
//! attempts, a backoff between them, and a classifier deciding whether an
//! error is worth another attempt.

use rand::Rng as _;
use std::future::Future;
use std::time::Duration;

/// Retry decision returned by the error classifier callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),

    /// `min(base * 2^(attempt-1), max)` plus up to `base` of jitter
    Exponential { base: Duration, max: Duration },
}

/// Bounded retry policy with a backoff schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(5, Duration::from_secs(30))
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` counts the first attempt and is at least 1
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Creates a policy with a fixed delay between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed(delay))
    }

    /// Creates a policy that never waits between attempts (for tests)
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Compute the delay after a failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1);
                let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
                let capped = base.saturating_mul(factor).min(max);
                let jitter_ms = base.as_millis() as u64;
                let jitter = if jitter_ms > 0 {
                    Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
                } else {
                    Duration::ZERO
                };
                capped + jitter
            }
        }
    }

    /// Runs an async operation until it succeeds, the classifier aborts, or
    /// the attempts are exhausted.
    ///
    /// - `label`: describes the operation in log messages
    /// - `classifier`: inspects an error and returns `Retry` or `Abort`
    /// - `operation`: the async closure to retry
    ///
    /// Returns the first `Ok` result, or the last error.
    pub async fn run<F, Fut, T, E, C>(&self, label: &str, classifier: C, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> RetryAction,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if classifier(&e) == RetryAction::Abort {
                        tracing::error!("{}: non-retryable error: {}", label, e);
                        return Err(e);
                    }
                    if attempt >= self.max_attempts {
                        tracing::error!(
                            "{}: giving up after {} attempts: {}",
                            label,
                            self.max_attempts,
                            e
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        "{}: attempt {}/{} failed, retrying in {:?}: {}",
                        label,
                        attempt,
                        self.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Randomized delay between two bounds, used for politeness pauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    /// A range that never sleeps
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    /// Sleeps for a random duration within the range
    pub async fn sleep(&self) -> Duration {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }
}
