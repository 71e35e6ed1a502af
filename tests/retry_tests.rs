//! Tests for retry logic
//!
//! Verify exponential backoff, retry policies, and error classification.

use blueprintctl::error::{BlueprintError, IsRetryable};
use blueprintctl::retry::{ExponentialBackoffPolicy, NoRetryPolicy, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

fn transient_error() -> BlueprintError {
    BlueprintError::Gcloud {
        command: "compute instances describe vm".to_string(),
        message: "backend unavailable".to_string(),
        source: None,
    }
}

#[test]
fn test_retry_succeeds_immediately() {
    let policy = ExponentialBackoffPolicy::new(3);
    let call_count = AtomicU32::new(0);

    let result = policy.execute_with_retry(|| {
        call_count.fetch_add(1, Ordering::SeqCst);
        Ok::<String, BlueprintError>("success".to_string())
    });

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), "success");
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_retry_succeeds_after_failures() {
    let policy = ExponentialBackoffPolicy::new(3);
    let call_count = AtomicU32::new(0);

    let result = policy.execute_with_retry(|| {
        let count = call_count.fetch_add(1, Ordering::SeqCst);
        if count < 2 {
            Err(transient_error())
        } else {
            Ok::<String, BlueprintError>("success".to_string())
        }
    });

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), "success");
    assert_eq!(call_count.load(Ordering::SeqCst), 3);
}

#[test]
fn test_retry_exhausts_attempts() {
    let policy = ExponentialBackoffPolicy::new(3);
    let call_count = AtomicU32::new(0);

    let result = policy.execute_with_retry(|| {
        call_count.fetch_add(1, Ordering::SeqCst);
        Err::<String, _>(transient_error())
    });

    assert!(result.is_err());
    assert_eq!(call_count.load(Ordering::SeqCst), 3);
    assert!(matches!(
        result.unwrap_err(),
        BlueprintError::Retryable { max_attempts: 3, .. }
    ));
}

#[test]
fn test_retry_non_retryable_error() {
    let policy = ExponentialBackoffPolicy::new(3);
    let call_count = AtomicU32::new(0);

    let result = policy.execute_with_retry(|| {
        call_count.fetch_add(1, Ordering::SeqCst);
        Err::<String, _>(BlueprintError::Validation {
            field: "zone".to_string(),
            reason: "invalid".to_string(),
        })
    });

    assert!(result.is_err());
    // Non-retryable errors should not be retried
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_retry_backs_off_between_attempts() {
    let policy = ExponentialBackoffPolicy::new(2);
    let start = Instant::now();

    let _ = policy.execute_with_retry(|| Err::<(), _>(transient_error()));

    // One backoff of at least the initial delay happened
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[test]
fn test_no_retry_policy_behavior() {
    let policy = NoRetryPolicy;
    let call_count = AtomicU32::new(0);

    let result = policy.execute_with_retry(|| {
        call_count.fetch_add(1, Ordering::SeqCst);
        Err::<String, _>(transient_error())
    });

    assert!(result.is_err());
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_error_retryability() {
    assert!(transient_error().is_retryable());
    assert!(BlueprintError::Terraform {
        operation: "output".to_string(),
        dir: "0-bootstrap".to_string(),
        message: "lock contention".to_string(),
        source: None,
    }
    .is_retryable());
    assert!(!BlueprintError::OutputMissing {
        name: "project_id".to_string(),
        dir: "0-bootstrap".to_string(),
    }
    .is_retryable());
}
