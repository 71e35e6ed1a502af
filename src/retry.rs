//! Retry logic with exponential backoff
//!
//! Cloud describe calls are transiently flaky right after provisioning
//! (eventual consistency, quota hiccups). gcloud reads go through a retry
//! policy; terraform apply/destroy do not, they are not safely repeatable.

use crate::error::{BlueprintError, IsRetryable, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Retry policy trait
pub trait RetryPolicy: Send + Sync {
    /// Execute a function with retry logic
    fn execute_with_retry<F, T>(&self, f: F) -> Result<T>
    where
        F: Fn() -> Result<T>;
}

/// Exponential backoff retry policy
pub struct ExponentialBackoffPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl ExponentialBackoffPolicy {
    /// Create a new exponential backoff policy
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.1,
        }
    }

    /// Default policy (3 attempts)
    pub fn default_policy() -> Self {
        Self::new(3)
    }

    /// Policy for cloud read APIs (5 attempts)
    pub fn for_cloud_reads() -> Self {
        Self::new(5)
    }

    /// Calculate backoff delay for given attempt number
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponential = self.initial_delay.as_millis() as f64 * 2f64.powi(attempt as i32);
        let delay_ms = exponential.min(self.max_delay.as_millis() as f64);

        // Add jitter to prevent thundering herd
        let jitter = delay_ms * self.jitter_factor * fastrand::f64();
        Duration::from_millis((delay_ms + jitter) as u64)
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    fn execute_with_retry<F, T>(&self, f: F) -> Result<T>
    where
        F: Fn() -> Result<T>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            match f() {
                Ok(result) => {
                    if attempt > 0 {
                        info!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        warn!("Non-retryable error, aborting: {}", e);
                        return Err(e);
                    }

                    if attempt == self.max_attempts - 1 {
                        warn!("Max retries ({}) reached", self.max_attempts);
                        return Err(BlueprintError::Retryable {
                            attempt: attempt + 1,
                            max_attempts: self.max_attempts,
                            reason: format!("{}", e),
                            source: Some(Box::new(e)),
                        });
                    }

                    last_error = Some(e);
                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        "Retryable error (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.max_attempts,
                        backoff,
                        last_error.as_ref().map(|e| e.to_string()).unwrap_or_default()
                    );
                    std::thread::sleep(backoff);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| BlueprintError::Retryable {
            attempt: self.max_attempts,
            max_attempts: self.max_attempts,
            reason: "Unknown error".to_string(),
            source: None,
        }))
    }
}

/// No retry policy (for operations that shouldn't be retried)
pub struct NoRetryPolicy;

impl RetryPolicy for NoRetryPolicy {
    fn execute_with_retry<F, T>(&self, f: F) -> Result<T>
    where
        F: Fn() -> Result<T>,
    {
        f()
    }
}
