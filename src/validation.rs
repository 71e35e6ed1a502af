//! Input validation utilities
//!
//! Validates user inputs before any terraform or gcloud process is spawned,
//! so typos fail fast instead of mid-lifecycle.

use crate::error::{BlueprintError, Result};
use regex::Regex;

fn matches(pattern: &str, input: &str) -> bool {
    Regex::new(pattern)
        .map(|re| re.is_match(input))
        .unwrap_or(false)
}

/// Validate an environment name against the configured set
pub fn validate_environment(env: &str, known: &[String]) -> Result<()> {
    if known.iter().any(|k| k == env) {
        return Ok(());
    }
    Err(BlueprintError::Validation {
        field: "environment".to_string(),
        reason: format!(
            "Unknown environment '{}', expected one of: {}",
            env,
            known.join(", ")
        ),
    })
}

/// Validate a GCP project id
///
/// Project ids are 6-30 characters, start with a lowercase letter, and
/// contain only lowercase letters, digits and hyphens.
pub fn validate_project_id(project_id: &str) -> Result<()> {
    if !matches(r"^[a-z][a-z0-9-]{4,28}[a-z0-9]$", project_id) {
        return Err(BlueprintError::Validation {
            field: "project_id".to_string(),
            reason: format!(
                "Project id must match [a-z][a-z0-9-]{{4,28}}[a-z0-9], got: {}",
                project_id
            ),
        });
    }
    Ok(())
}

/// Validate a compute zone name, e.g. `us-central1-a`
pub fn validate_zone(zone: &str) -> Result<()> {
    if !matches(r"^[a-z]+-[a-z]+\d+-[a-z]$", zone) {
        return Err(BlueprintError::Validation {
            field: "zone".to_string(),
            reason: format!("Zone must look like 'us-central1-a', got: {}", zone),
        });
    }
    Ok(())
}

/// Validate a business unit directory name, e.g. `business_unit_1`
pub fn validate_business_unit(business_unit: &str) -> Result<()> {
    let valid = !business_unit.is_empty()
        && business_unit
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(BlueprintError::Validation {
            field: "business_unit".to_string(),
            reason: format!(
                "Business unit must contain only lowercase letters, digits and underscores, got: {}",
                business_unit
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known_envs() -> Vec<String> {
        vec![
            "development".to_string(),
            "nonproduction".to_string(),
            "production".to_string(),
        ]
    }

    #[test]
    fn test_validate_environment() {
        assert!(validate_environment("development", &known_envs()).is_ok());
        assert!(validate_environment("production", &known_envs()).is_ok());
        assert!(validate_environment("staging", &known_envs()).is_err());
        assert!(validate_environment("", &known_envs()).is_err());
    }

    #[test]
    fn test_validate_project_id() {
        assert!(validate_project_id("prj-bu1-dev-sample").is_ok());
        assert!(validate_project_id("my-project-123456").is_ok());

        assert!(validate_project_id("Short").is_err()); // uppercase
        assert!(validate_project_id("ab").is_err()); // too short
        assert!(validate_project_id("1starts-with-digit").is_err());
        assert!(validate_project_id("ends-with-hyphen-").is_err());
    }

    #[test]
    fn test_validate_zone() {
        assert!(validate_zone("us-central1-a").is_ok());
        assert!(validate_zone("europe-west4-b").is_ok());

        assert!(validate_zone("us-central1").is_err()); // region, not zone
        assert!(validate_zone("US-CENTRAL1-A").is_err());
        assert!(validate_zone("").is_err());
    }

    #[test]
    fn test_validate_business_unit() {
        assert!(validate_business_unit("business_unit_1").is_ok());
        assert!(validate_business_unit("bu2").is_ok());

        assert!(validate_business_unit("Business-Unit").is_err());
        assert!(validate_business_unit("").is_err());
    }
}
