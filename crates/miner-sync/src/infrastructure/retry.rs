//! Retry policy with bounded attempts
//!
//! `max_attempts` counts every attempt including the first, so a policy of three
//! attempts sleeps at most twice. Linear backoff waits `initial_delay * n` after the
//! `n`th failed attempt.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Backoff strategy for retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Linear increase: delay * attempt
    Linear,
    /// Exponential increase: delay * 2^(attempt - 1)
    Exponential,
}

impl BackoffStrategy {
    /// Delay after the `failed_attempt`th attempt failed (1-based).
    pub fn calculate_delay(
        &self,
        failed_attempt: u32,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Duration {
        let n = failed_attempt.max(1);
        let delay = match self {
            BackoffStrategy::Fixed => initial_delay,
            BackoffStrategy::Linear => initial_delay.saturating_mul(n),
            BackoffStrategy::Exponential => {
                initial_delay.saturating_mul(2u32.saturating_pow(n - 1))
            }
        };
        delay.min(max_delay)
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base delay
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Backoff strategy to use
    pub strategy: BackoffStrategy,
}

impl RetryPolicy {
    /// Linear backoff, three attempts, 3 s base.
    pub fn linear() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(3000),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Linear,
        }
    }

    /// Exponential backoff, three attempts, 100 ms base.
    pub fn exponential() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Set total attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set base delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay after the `failed_attempt`th attempt failed (1-based).
    pub fn calculate_delay(&self, failed_attempt: u32) -> Duration {
        self.strategy
            .calculate_delay(failed_attempt, self.initial_delay, self.max_delay)
    }

    /// Run `operation` until it succeeds, a failure is not retryable, or the attempts
    /// run out.
    pub async fn execute<F, Fut, T, E, P>(&self, mut operation: F, retryable: P) -> RetryResult<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        let mut total_delay = Duration::ZERO;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    return RetryResult {
                        result: Ok(value),
                        attempts: attempt,
                        total_retry_delay: total_delay,
                    }
                }
                Err(err) if attempt < max_attempts && retryable(&err) => {
                    let delay = self.calculate_delay(attempt);
                    tracing::debug!(attempt, ?delay, "Attempt failed, backing off");
                    total_delay += delay;
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return RetryResult {
                        result: Err(err),
                        attempts: attempt,
                        total_retry_delay: total_delay,
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear()
    }
}

/// Result of a retry operation with statistics
#[derive(Debug, Clone)]
pub struct RetryResult<T, E> {
    /// Final result (success or failure)
    pub result: Result<T, E>,
    /// Number of attempts made
    pub attempts: u32,
    /// Total time spent waiting between attempts
    pub total_retry_delay: Duration,
}

impl<T, E> RetryResult<T, E> {
    /// Check if operation succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Check if any retries were performed
    pub fn had_retries(&self) -> bool {
        self.attempts > 1
    }

    /// Get the result
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn linear_delays_grow_by_base() {
        let policy = RetryPolicy::linear();
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(3000));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(6000));
    }

    #[test]
    fn delays_are_capped() {
        let policy = RetryPolicy::exponential().with_max_delay(Duration::from_millis(250));
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let outcome: RetryResult<(), &str> = RetryPolicy::linear()
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("offline") }
                },
                |_| true,
            )
            .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.total_retry_delay, Duration::from_millis(9000));
        assert_eq!(started.elapsed(), Duration::from_millis(9000));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_errors_stop_immediately() {
        let outcome: RetryResult<(), &str> = RetryPolicy::linear()
            .execute(|_| async { Err("rejected") }, |err| *err != "rejected")
            .await;
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.had_retries());
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_later_attempt() {
        let outcome: RetryResult<u32, &str> = RetryPolicy::linear()
            .execute(
                |attempt| async move {
                    if attempt < 2 {
                        Err("offline")
                    } else {
                        Ok(attempt)
                    }
                },
                |_| true,
            )
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.into_result(), Ok(2));
    }
}
