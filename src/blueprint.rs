//! Blueprint stage handle
//!
//! A `Blueprint` binds one Terraform stage directory together with its
//! backend config, variables and process environment, and exposes typed
//! output access plus the provision/verify/teardown lifecycle. Outputs are
//! fetched once and cached; repeated reads do not shell out again.

use crate::error::Result;
use crate::exec::CommandRunner;
use crate::gcloud::Gcloud;
use crate::terraform::{Outputs, Terraform, TerraformOptions};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub struct Blueprint {
    terraform: Terraform,
    policy_library: Option<PathBuf>,
    policy_project: Option<String>,
    outputs: Mutex<Option<Outputs>>,
}

impl Blueprint {
    pub fn new(runner: Arc<dyn CommandRunner>, options: TerraformOptions) -> Self {
        Self {
            terraform: Terraform::new(runner, options),
            policy_library: None,
            policy_project: None,
            outputs: Mutex::new(None),
        }
    }

    /// Hook up a policy library; plans are vetted against it before apply
    pub fn with_policy_library(mut self, path: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        self.policy_library = Some(path.into());
        self.policy_project = Some(project.into());
        self
    }

    pub fn options(&self) -> &TerraformOptions {
        self.terraform.options()
    }

    fn outputs(&self) -> Result<Outputs> {
        let mut cached = self
            .outputs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(outputs) = cached.as_ref() {
            return Ok(outputs.clone());
        }
        let outputs = self.terraform.output_document()?;
        *cached = Some(outputs.clone());
        Ok(outputs)
    }

    pub fn output_string(&self, name: &str) -> Result<String> {
        self.outputs()?.string(name)
    }

    pub fn output_map(&self, name: &str) -> Result<BTreeMap<String, String>> {
        self.outputs()?.map(name)
    }

    pub fn output_list(&self, name: &str) -> Result<Vec<String>> {
        self.outputs()?.list(name)
    }

    /// First element of a list output
    pub fn output_first(&self, name: &str) -> Result<String> {
        self.outputs()?.first(name)
    }

    /// All outputs as `{name: value}`
    pub fn output_values(&self) -> Result<serde_json::Value> {
        Ok(self.outputs()?.values())
    }

    /// init, vet the plan when a policy library is configured, then apply
    pub fn setup(&self, gcloud: &Gcloud) -> Result<()> {
        self.terraform.init()?;
        if self.policy_library.is_some() {
            self.vet(gcloud)?;
        }
        self.terraform.apply()?;
        // Outputs fetched before apply would be stale
        *self
            .outputs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }

    pub fn teardown(&self) -> Result<()> {
        self.terraform.destroy()
    }

    /// Run `gcloud beta terraform vet` on the stage plan
    pub fn vet(&self, gcloud: &Gcloud) -> Result<()> {
        let (Some(library), Some(project)) = (&self.policy_library, &self.policy_project) else {
            return Ok(());
        };

        let dir = &self.terraform.options().dir;
        let plan_file = dir.join(".blueprintctl.tfplan");
        let plan_json = dir.join(".blueprintctl-plan.json");

        info!("vetting plan against {}", library.display());
        self.terraform.plan(Some(&plan_file))?;
        let rendered = self.terraform.show_plan_json(&plan_file)?;
        std::fs::write(&plan_json, rendered)?;

        let result = gcloud.run(&format!(
            "beta terraform vet {} --policy-library={} --project={}",
            plan_json.display(),
            library.display(),
            project
        ));

        for artifact in [&plan_file, &plan_json] {
            if let Err(e) = std::fs::remove_file(artifact) {
                warn!("could not remove plan artifact {}: {}", artifact.display(), e);
            }
        }

        result.map(|_| ())
    }

    /// Full lifecycle: setup, verify, teardown. Teardown always runs; a
    /// verification error wins over a teardown error.
    pub fn test<T, F>(&self, gcloud: &Gcloud, verify: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.setup(gcloud)?;
        let verified = verify(self);
        let teardown = self.teardown();
        match (verified, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(td)) => {
                warn!("teardown also failed after verification error: {}", td);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }
}
