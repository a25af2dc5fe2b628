//! Bounded retry with backoff for store writes
//!
//! Every attempt runs under its own deadline, so a retried call finishes in at
//! most `max_attempts * attempt_timeout` plus the backoff delays.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::error::AuditError;

/// Retry policy configuration
///
/// # Example
///
/// ```
/// use fwaudit::retry::{BackoffStrategy, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     max_attempts: 5,
///     initial_delay: Duration::from_millis(100),
///     backoff: BackoffStrategy::Exponential,
///     ..Default::default()
/// };
/// assert_eq!(policy.calculate_delay(3), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,

    /// Initial delay before first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff strategy
    pub backoff: BackoffStrategy,

    /// Jitter factor (0.0-1.0)
    pub jitter_factor: f64,

    /// Deadline for a single attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            backoff: BackoffStrategy::ExponentialWithJitter,
            jitter_factor: 0.3,
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

/// Backoff strategy for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,

    /// Linear increase in delay
    Linear,

    /// Exponential increase in delay (2^n)
    Exponential,

    /// Exponential with random jitter
    #[default]
    ExponentialWithJitter,
}

impl RetryPolicy {
    /// Calculate delay for a given attempt number (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let base_delay = match self.backoff {
            BackoffStrategy::Linear => self.initial_delay.saturating_mul(attempt),
            BackoffStrategy::Exponential | BackoffStrategy::ExponentialWithJitter => {
                let multiplier = 2_u32.saturating_pow(attempt - 1);
                self.initial_delay.saturating_mul(multiplier)
            }
            BackoffStrategy::Fixed => self.initial_delay,
        };

        // Cap at max_delay
        let capped_delay = base_delay.min(self.max_delay);

        // Add jitter if enabled; an empty range would panic
        let jittered = matches!(self.backoff, BackoffStrategy::ExponentialWithJitter);
        if jittered && self.jitter_factor > 0.0 {
            let jitter = rand::rng().random_range(0.0..self.jitter_factor);
            let jitter_amount = capped_delay.as_secs_f64() * jitter;
            capped_delay + Duration::from_secs_f64(jitter_amount)
        } else {
            capped_delay
        }
    }
}

/// Outcome of a retried operation
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, AuditError>,

    /// Attempts made, including the first
    pub attempts: u32,
}

impl<T> RetryOutcome<T> {
    /// Number of attempts beyond the first
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Run an idempotent store operation with bounded retries
///
/// Each attempt is cut off after `attempt_timeout`. Non-transient errors stop
/// the loop immediately. `on_retry` is called before each backoff sleep with
/// the attempt number that just failed and its error.
pub async fn with_retry<F, Fut, T, R>(
    policy: &RetryPolicy,
    operation: F,
    on_retry: R,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    R: FnMut(u32, &AuditError),
{
    retry_loop(policy, operation, on_retry, true).await
}

/// Run a store operation that must not be applied twice
///
/// Same as [`with_retry`], except a timed-out attempt is not retried: it may
/// have been applied after the deadline.
pub async fn with_retry_once<F, Fut, T, R>(
    policy: &RetryPolicy,
    operation: F,
    on_retry: R,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    R: FnMut(u32, &AuditError),
{
    retry_loop(policy, operation, on_retry, false).await
}

async fn retry_loop<F, Fut, T, R>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: R,
    retry_timeouts: bool,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    R: FnMut(u32, &AuditError),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match timeout(policy.attempt_timeout, operation()).await {
            Ok(Ok(value)) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Ok(Err(e)) => AuditError::Store(e),
            Err(_) => AuditError::Timeout(policy.attempt_timeout.as_millis() as u64),
        };

        let timed_out = matches!(error, AuditError::Timeout(_));
        if attempt >= max_attempts || !error.is_transient() || (timed_out && !retry_timeouts) {
            return RetryOutcome {
                result: Err(error),
                attempts: attempt,
            };
        }

        on_retry(attempt, &error);
        sleep(policy.calculate_delay(attempt)).await;
    }
}
