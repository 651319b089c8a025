//! Attempt budgeting and cancellable backoff delays.
//!
//! A [`BackoffCounter`] is owned by exactly one logical operation. The caller
//! [`reset`](BackoffCounter::reset)s it with the attempt budget before the
//! first try, [`decrement`](BackoffCounter::decrement)s it after each failure
//! and, when attempts remain, awaits
//! [`wait_backoff`](BackoffCounter::wait_backoff) before trying again.
//!
//! Delays come from a [`BackoffStrategy`]. Every built-in strategy yields
//! delays that never shrink as the attempt number grows. Waiting goes through
//! tokio's timer, so tests can drive it with a paused clock.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors raised while waiting between attempts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackoffError {
    /// The cancellation token fired before the delay elapsed.
    #[error("backoff wait cancelled after {waited:?} of {delay:?}")]
    Cancelled {
        /// Time slept before cancellation was observed.
        waited: Duration,
        /// Full delay that was scheduled.
        delay: Duration,
    },
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Linear backoff: initial_delay + (retry * increment)
    Linear { initial_delay: Duration, increment: Duration },
    /// Exponential backoff: initial_delay * base^retry, capped at max_delay
    Exponential { initial_delay: Duration, base: f64, max_delay: Duration },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial_delay: Duration::from_secs(1),
            base: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffStrategy {
    /// Delay before the retry numbered `retry` (zero-based).
    ///
    /// An exponential base below `1.0` is treated as `1.0` so the sequence
    /// stays non-decreasing.
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Linear { initial_delay, increment } => {
                initial_delay.saturating_add(increment.saturating_mul(retry))
            }
            Self::Exponential { initial_delay, base, max_delay } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let millis = initial_delay.as_millis() as f64 * base.max(1.0).powi(exponent);
                let capped = millis.min(max_delay.as_millis() as f64);
                Duration::from_millis(capped as u64)
            }
        }
    }
}

/// Tracks the remaining attempts of one logical operation.
#[derive(Debug, Clone)]
pub struct BackoffCounter {
    strategy: BackoffStrategy,
    attempts_remaining: u32,
    retries: u32,
    total_waited: Duration,
}

impl Default for BackoffCounter {
    fn default() -> Self {
        Self::new(BackoffStrategy::default())
    }
}

impl BackoffCounter {
    /// Creates a counter with no attempts; call [`reset`](Self::reset) first.
    pub fn new(strategy: BackoffStrategy) -> Self {
        Self { strategy, attempts_remaining: 0, retries: 0, total_waited: Duration::ZERO }
    }

    /// Arms the counter with a fresh budget of `max_attempts`.
    pub fn reset(&mut self, max_attempts: u32) {
        self.attempts_remaining = max_attempts;
        self.retries = 0;
        self.total_waited = Duration::ZERO;
    }

    /// Consumes one attempt and reports whether any remain.
    pub fn decrement(&mut self) -> bool {
        self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
        self.attempts_remaining > 0
    }

    /// Attempts left in the current budget.
    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining
    }

    /// Number of backoff waits performed since the last reset.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Total time spent in completed waits since the last reset.
    pub fn total_waited(&self) -> Duration {
        self.total_waited
    }

    /// Delay the next [`wait_backoff`](Self::wait_backoff) will sleep for.
    pub fn next_delay(&self) -> Duration {
        self.strategy.calculate_delay(self.retries)
    }

    /// Sleeps for the next delay unless `cancel` fires first.
    ///
    /// On cancellation the token is left cancelled so the caller observes it
    /// too, and [`BackoffError::Cancelled`] is returned.
    pub async fn wait_backoff(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Duration, BackoffError> {
        let delay = self.next_delay();
        self.retries = self.retries.saturating_add(1);

        if cancel.is_cancelled() {
            return Err(BackoffError::Cancelled { waited: Duration::ZERO, delay });
        }

        debug!(retry = self.retries, delay_ms = delay.as_millis() as u64, "backing off");

        let started = tokio::time::Instant::now();
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                Err(BackoffError::Cancelled { waited: started.elapsed(), delay })
            }
            () = tokio::time::sleep(delay) => {
                self.total_waited = self.total_waited.saturating_add(delay);
                Ok(delay)
            }
        }
    }
}
