//! Retry policy with fixed backoff
//!
//! Treats both raised errors and rejected-but-successful results as
//! retryable, so one policy serves every tool regardless of how a
//! downstream failure surfaces.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (first call included)
    pub max_attempts: u32,

    /// Wait between consecutive attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(3),
        }
    }
}

/// Why the last attempt of an exhausted retry loop failed
#[derive(Debug, Clone, PartialEq)]
pub enum RetryFailure<T, E> {
    /// The operation returned an error
    Error(E),
    /// The operation returned a value the predicate rejected
    Rejected(T),
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `operation` until it yields a value `is_rejected` accepts, or the
    /// attempts run out. Failures are judged by the last attempt only.
    pub async fn execute<F, Fut, T, E, P>(
        &self,
        operation_name: &str,
        mut operation: F,
        is_rejected: P,
    ) -> Result<T, RetryFailure<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&T) -> bool,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(
                "Attempt {}/{} for operation: {}",
                attempt, attempts, operation_name
            );

            let failure = match operation().await {
                Ok(value) if !is_rejected(&value) => {
                    if attempt > 1 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name,
                            attempt - 1
                        );
                    }
                    return Ok(value);
                }
                Ok(value) => {
                    warn!(
                        "Operation '{}' returned an error payload (attempt {}/{})",
                        operation_name, attempt, attempts
                    );
                    RetryFailure::Rejected(value)
                }
                Err(e) => {
                    warn!(
                        "Operation '{}' failed (attempt {}/{}): {}",
                        operation_name, attempt, attempts, e
                    );
                    RetryFailure::Error(e)
                }
            };

            if attempt >= attempts {
                warn!(
                    "Operation '{}' gave up after {} attempts",
                    operation_name, attempts
                );
                return Err(failure);
            }

            debug!("Retrying '{}' in {:?}", operation_name, self.backoff);
            sleep(self.backoff).await;
            attempt += 1;
        }
    }
}
