//! App-infra resource verification
//!
//! Reads the app-infra stage outputs and compares live resource state,
//! queried through gcloud, against the expected shape: an f1-micro sample
//! instance, a workload identity pool with its provider, and a confidential
//! space instance locked to SEV that live-migrates on host maintenance and
//! carries a single dedicated service account.

use crate::blueprint::Blueprint;
use crate::error::Result;
use crate::gcloud::Gcloud;
use crate::json::JsonQuery;
use crate::retry::{ExponentialBackoffPolicy, RetryPolicy};
use crate::validation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// One expected/actual comparison against live resource state
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

/// All checks for one environment
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub environment: String,
    pub checks: Vec<Check>,
    pub finished_at: DateTime<Utc>,
}

impl CheckReport {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            checks: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn equals(&mut self, name: &str, expected: &str, actual: &str) {
        self.checks.push(Check {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            passed: expected == actual,
        });
    }

    pub fn is_true(&mut self, name: &str, actual: bool) {
        self.checks.push(Check {
            name: name.to_string(),
            expected: "true".to_string(),
            actual: actual.to_string(),
            passed: actual,
        });
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> Vec<&Check> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    /// Error out on the first failed check
    pub fn ensure_passed(&self) -> Result<()> {
        match self.failures().first() {
            None => Ok(()),
            Some(check) => Err(crate::error::BlueprintError::CheckFailed {
                name: check.name.clone(),
                expected: check.expected.clone(),
                actual: check.actual.clone(),
            }),
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}

/// Verify the app-infra stage of one environment
///
/// `gcloud` carries the binary and process env (impersonation); per-resource
/// scopes (`--project`, `--zone`) are cloned onto it here, mirroring how each
/// resource is described with its own common args.
pub fn verify_app_infra(env: &str, app_infra: &Blueprint, gcloud: &Gcloud) -> Result<CheckReport> {
    let retry = ExponentialBackoffPolicy::for_cloud_reads();
    let mut report = CheckReport::new(env);

    // Sample workload instance
    let project_id = app_infra.output_string("project_id")?;
    let instance_name = app_infra.output_first("instances_names")?;
    let instance_zone = app_infra.output_first("instances_zones")?;
    validation::validate_project_id(&project_id)?;
    validation::validate_zone(&instance_zone)?;
    let expected_machine_type = format!(
        "https://www.googleapis.com/compute/v1/projects/{}/zones/{}/machineTypes/f1-micro",
        project_id, instance_zone
    );

    debug!("describing instance {} in {}", instance_name, project_id);
    let instance_scope = gcloud.clone().with_common_args([
        "--project",
        project_id.as_str(),
        "--zone",
        instance_zone.as_str(),
    ]);
    let instance = retry.execute_with_retry(|| {
        instance_scope.run(&format!("compute instances describe {}", instance_name))
    })?;
    report.equals(
        "instance machine type",
        &expected_machine_type,
        instance.str_at("machineType"),
    );

    // Workload identity pool and provider, owned by the confidential project
    let pool_id = app_infra.output_string("workload_identity_pool_id")?;
    let pool_provider_id = app_infra.output_string("workload_pool_provider_id")?;
    let confidential_project_id = app_infra.output_string("confidential_space_project_id")?;
    let confidential_project_number =
        app_infra.output_string("confidential_space_project_number")?;

    let pool_scope = gcloud
        .clone()
        .with_common_args(["--project", confidential_project_id.as_str()]);
    let pool = retry.execute_with_retry(|| {
        pool_scope.run(&format!(
            "iam workload-identity-pools describe {} --location=global",
            pool_id
        ))
    })?;
    report.equals(
        "workload identity pool name",
        &format!(
            "projects/{}/locations/global/workloadIdentityPools/{}",
            confidential_project_number, pool_id
        ),
        pool.str_at("name"),
    );

    let provider_scope = gcloud.clone().with_common_args([
        format!("--workload-identity-pool={}", pool_id),
        "--location=global".to_string(),
        "--project".to_string(),
        confidential_project_id.clone(),
    ]);
    let provider = retry.execute_with_retry(|| {
        provider_scope.run(&format!(
            "iam workload-identity-pools providers describe {}",
            pool_provider_id
        ))
    })?;
    report.equals(
        "workload identity pool provider display name",
        &pool_provider_id,
        provider.str_at("displayName"),
    );

    // Confidential space instance
    let confidential_name = app_infra.output_first("confidential_instances_names")?;
    let confidential_zone = app_infra.output_first("confidential_instances_zones")?;
    validation::validate_project_id(&confidential_project_id)?;
    validation::validate_zone(&confidential_zone)?;

    let confidential_scope = gcloud.clone().with_common_args([
        "--project",
        confidential_project_id.as_str(),
        "--zone",
        confidential_zone.as_str(),
    ]);
    let confidential = retry.execute_with_retry(|| {
        confidential_scope.run(&format!("compute instances describe {}", confidential_name))
    })?;

    report.is_true(
        "confidential instance details present",
        !confidential.is_null(),
    );
    report.equals(
        "confidential instance name",
        &confidential_name,
        confidential.str_at("name"),
    );
    report.is_true(
        "confidential compute enabled",
        confidential.bool_at("confidentialInstanceConfig.enableConfidentialCompute"),
    );
    report.equals(
        "confidential instance type",
        "SEV",
        confidential.str_at("confidentialInstanceConfig.confidentialInstanceType"),
    );
    report.equals(
        "host maintenance policy",
        "MIGRATE",
        confidential.str_at("scheduling.onHostMaintenance"),
    );
    report.equals(
        "service account count",
        "1",
        &confidential.len_at("serviceAccounts").to_string(),
    );
    report.equals(
        "workload service account",
        &format!(
            "confidential-space-workload-sa@{}.iam.gserviceaccount.com",
            confidential_project_id
        ),
        confidential.str_at("serviceAccounts.0.email"),
    );

    Ok(report.finish())
}
