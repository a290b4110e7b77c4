//! Bounded retry with a fixed delay between attempts.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

/// Errors that know whether a repeat attempt may succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for super::FetchError {
    fn is_retryable(&self) -> bool {
        super::FetchError::is_retryable(self)
    }
}

/// Final failure of a retried operation
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Attempts made, including the first
    pub attempts: u32,
    /// True when the retry budget ran out on a retryable error
    pub exhausted: bool,
    /// The last error observed
    pub error: E,
}

/// Retry policy: a fixed number of attempts with a fixed delay between them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt)
    max_attempts: u32,
    /// Delay before each retry
    delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy. At least one attempt is always made.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Maximum number of attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Execute an async operation with retry logic.
    ///
    /// Only retries on retryable errors (network, timeout).
    /// Returns immediately on non-retryable errors.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_retryable() => {
                    return Err(RetryFailure {
                        attempts: attempt,
                        exhausted: false,
                        error: e,
                    });
                }
                Err(e) if attempt >= self.max_attempts => {
                    warn!(attempts = attempt, error = %e, "Retries exhausted");
                    return Err(RetryFailure {
                        attempts: attempt,
                        exhausted: true,
                        error: e,
                    });
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Retryable error, will retry"
                    );
                    if !self.delay.is_zero() {
                        debug!(delay = ?self.delay, "Retrying after delay");
                        sleep(self.delay).await;
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}
