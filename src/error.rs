//! Error types for blueprintctl
//!
//! Library code uses `crate::error::Result<T>` which returns `BlueprintError`.
//! CLI code uses `anyhow::Result<T>` for top-level error handling; the
//! conversion happens at the CLI boundary so error chains are preserved.
//!
//! Errors implement `IsRetryable` to indicate whether an operation may be
//! retried. The `RetryPolicy` in `src/retry.rs` uses this. Only `Gcloud`,
//! `Terraform`, `Io` and `Retryable` variants are retryable; validation and
//! configuration problems fail immediately.

use thiserror::Error;

/// Main error type for blueprintctl
#[derive(Error, Debug)]
pub enum BlueprintError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Terraform {operation} failed in {dir}: {message}")]
    Terraform {
        operation: String,
        dir: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("gcloud command failed: {command} - {message}")]
    Gcloud {
        command: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Output not found: {name} (stage: {dir})")]
    OutputMissing { name: String, dir: String },

    #[error("Output {name} has unexpected shape, expected {expected}")]
    OutputType { name: String, expected: String },

    #[error("Check failed: {name} - expected {expected}, got {actual}")]
    CheckFailed {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Validation error: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("Retryable error (attempt {attempt}/{max_attempts}): {reason}")]
    Retryable {
        attempt: u32,
        max_attempts: u32,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BlueprintError>;

/// Trait for determining if an error is retryable
///
/// Used by `RetryPolicy` implementations to decide whether an error should
/// trigger another attempt.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for BlueprintError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            BlueprintError::Retryable { .. }
                | BlueprintError::Terraform { .. }
                | BlueprintError::Gcloud { .. }
                | BlueprintError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let gcloud = BlueprintError::Gcloud {
            command: "compute instances describe vm".to_string(),
            message: "quota".to_string(),
            source: None,
        };
        assert!(gcloud.is_retryable());

        let validation = BlueprintError::Validation {
            field: "environment".to_string(),
            reason: "unknown".to_string(),
        };
        assert!(!validation.is_retryable());

        let check = BlueprintError::CheckFailed {
            name: "machine type".to_string(),
            expected: "f1-micro".to_string(),
            actual: "e2-small".to_string(),
        };
        assert!(!check.is_retryable());
    }

    #[test]
    fn test_output_missing_display() {
        let err = BlueprintError::OutputMissing {
            name: "project_id".to_string(),
            dir: "5-app-infra/business_unit_1/development".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("project_id"));
        assert!(msg.contains("5-app-infra"));
    }
}
