//! Cross-stage orchestration
//!
//! Wires the foundation stages together the way the outputs flow in a real
//! deployment: the bootstrap stage exports the projects state bucket, the
//! shared stage exports the per-application terraform service account and
//! backend bucket, and each environment's app-infra stage is provisioned and
//! verified with those inputs. Environments run as independent parallel
//! tasks; one failure does not cancel the others.

use crate::blueprint::Blueprint;
use crate::config::Config;
use crate::error::{BlueprintError, Result};
use crate::exec::{CommandRunner, SystemRunner};
use crate::gcloud::Gcloud;
use crate::terraform::TerraformOptions;
use crate::validation;
use crate::verify::{verify_app_infra, CheckReport};
use std::sync::Arc;
use tracing::{debug, info};

const IMPERSONATE_ENV: &str = "GOOGLE_IMPERSONATE_SERVICE_ACCOUNT";

/// Values resolved from the bootstrap and shared stages
#[derive(Debug, Clone)]
pub struct StageContext {
    /// `projects_gcs_bucket_tfstate` from 0-bootstrap, passed to app-infra
    /// as the `remote_state_bucket` var
    pub remote_state_bucket: String,
    /// Per-application terraform service account from the shared stage,
    /// impersonated by every downstream terraform/gcloud call
    pub terraform_service_account: String,
    /// Per-application state bucket from the shared stage, used as the
    /// app-infra backend
    pub backend_bucket: String,
}

/// Outcome of one environment's run
pub struct EnvOutcome {
    pub environment: String,
    pub result: Result<CheckReport>,
}

pub struct Orchestrator {
    config: Config,
    runner: Arc<dyn CommandRunner>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self::with_runner(config, Arc::new(SystemRunner))
    }

    pub fn with_runner(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    fn base_options(&self, dir: std::path::PathBuf) -> TerraformOptions {
        let mut options = TerraformOptions::new(dir).with_binary(&self.config.terraform.binary);
        for (key, value) in &self.config.terraform.extra_env {
            options = options.with_env(key.clone(), value.clone());
        }
        options
    }

    /// Read the bootstrap and shared stage outputs and derive the context
    /// every environment shares
    pub fn resolve_context(&self) -> Result<StageContext> {
        let app_key = &self.config.foundation.app_key;

        let bootstrap = Blueprint::new(
            self.runner.clone(),
            self.base_options(self.config.bootstrap_dir()),
        );
        let remote_state_bucket = bootstrap.output_string("projects_gcs_bucket_tfstate")?;

        let shared = Blueprint::new(
            self.runner.clone(),
            self.base_options(self.config.shared_dir()),
        );
        let service_accounts = shared.output_map("terraform_service_accounts")?;
        let state_buckets = shared.output_map("state_buckets")?;

        let terraform_service_account =
            service_accounts
                .get(app_key)
                .cloned()
                .ok_or_else(|| BlueprintError::OutputMissing {
                    name: format!("terraform_service_accounts[{}]", app_key),
                    dir: self.config.shared_dir().display().to_string(),
                })?;
        let backend_bucket =
            state_buckets
                .get(app_key)
                .cloned()
                .ok_or_else(|| BlueprintError::OutputMissing {
                    name: format!("state_buckets[{}]", app_key),
                    dir: self.config.shared_dir().display().to_string(),
                })?;

        debug!("impersonating service account for {}", app_key);
        info!("remote state bucket: {}", remote_state_bucket);

        Ok(StageContext {
            remote_state_bucket,
            terraform_service_account,
            backend_bucket,
        })
    }

    fn gcloud(&self, ctx: &StageContext) -> Gcloud {
        Gcloud::new(self.runner.clone())
            .with_binary(&self.config.gcloud.binary)
            .with_env(IMPERSONATE_ENV, &ctx.terraform_service_account)
    }

    /// Projects stage handle for an environment (read-only, outputs feed the
    /// policy vet project)
    fn projects_blueprint(&self, env: &str, ctx: &StageContext) -> Blueprint {
        let options = self
            .base_options(self.config.projects_dir(env))
            .with_env(IMPERSONATE_ENV, &ctx.terraform_service_account);
        Blueprint::new(self.runner.clone(), options)
    }

    /// App-infra stage handle for an environment, fully wired: backend
    /// config, remote state var, impersonation env, policy library
    fn app_infra_blueprint(&self, env: &str, ctx: &StageContext) -> Result<Blueprint> {
        let options = self
            .base_options(self.config.app_infra_dir(env))
            .with_backend_config("bucket", &ctx.backend_bucket)
            .with_var("remote_state_bucket", &ctx.remote_state_bucket)
            .with_env(IMPERSONATE_ENV, &ctx.terraform_service_account);

        let mut blueprint = Blueprint::new(self.runner.clone(), options);
        if let Some(library) = &self.config.foundation.policy_library_path {
            let projects = self.projects_blueprint(env, ctx);
            let shared_vpc_project = projects.output_string("shared_vpc_project")?;
            blueprint = blueprint.with_policy_library(library, shared_vpc_project);
        }
        Ok(blueprint)
    }

    fn validate_envs(&self, envs: &[String]) -> Result<()> {
        for env in envs {
            validation::validate_environment(env, &self.config.foundation.environments)?;
        }
        Ok(())
    }

    /// Full lifecycle for one environment: provision, vet, verify, teardown
    fn test_env(&self, env: &str, ctx: &StageContext) -> Result<CheckReport> {
        info!("running app-infra lifecycle: {}", env);
        let gcloud = self.gcloud(ctx);
        let blueprint = self.app_infra_blueprint(env, ctx)?;
        blueprint.test(&gcloud, |bp| verify_app_infra(env, bp, &gcloud))
    }

    /// Verification only, against already-provisioned state
    fn verify_env(&self, env: &str, ctx: &StageContext) -> Result<CheckReport> {
        info!("verifying app-infra: {}", env);
        let gcloud = self.gcloud(ctx);
        let blueprint = self.app_infra_blueprint(env, ctx)?;
        verify_app_infra(env, &blueprint, &gcloud)
    }

    fn destroy_env(&self, env: &str, ctx: &StageContext) -> Result<CheckReport> {
        info!("destroying app-infra: {}", env);
        let blueprint = self.app_infra_blueprint(env, ctx)?;
        blueprint.teardown()?;
        Ok(CheckReport::new(env))
    }

    /// Run `op` for each environment on its own blocking task and collect
    /// every outcome
    async fn run_parallel(&self, envs: &[String], op: EnvOp) -> Result<Vec<EnvOutcome>> {
        self.validate_envs(envs)?;

        // Blocking tasks need owned state
        let shared = Arc::new(Self {
            config: self.config.clone(),
            runner: self.runner.clone(),
        });

        // Context resolution shells out to terraform, so it blocks too
        let ctx = {
            let this = Arc::clone(&shared);
            tokio::task::spawn_blocking(move || this.resolve_context())
                .await
                .map_err(|e| {
                    BlueprintError::Io(std::io::Error::other(format!("task panicked: {}", e)))
                })??
        };

        let mut handles = Vec::with_capacity(envs.len());
        for env in envs {
            let this = Arc::clone(&shared);
            let ctx = ctx.clone();
            let env = env.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let result = match op {
                    EnvOp::Test => this.test_env(&env, &ctx),
                    EnvOp::Verify => this.verify_env(&env, &ctx),
                    EnvOp::Destroy => this.destroy_env(&env, &ctx),
                };
                EnvOutcome {
                    environment: env,
                    result,
                }
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in futures::future::join_all(handles).await {
            let outcome = handle.map_err(|e| {
                BlueprintError::Io(std::io::Error::other(format!("task panicked: {}", e)))
            })?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    pub async fn test(&self, envs: &[String]) -> Result<Vec<EnvOutcome>> {
        self.run_parallel(envs, EnvOp::Test).await
    }

    pub async fn verify(&self, envs: &[String]) -> Result<Vec<EnvOutcome>> {
        self.run_parallel(envs, EnvOp::Verify).await
    }

    pub async fn destroy(&self, envs: &[String]) -> Result<Vec<EnvOutcome>> {
        self.run_parallel(envs, EnvOp::Destroy).await
    }

    /// Outputs of one stage directory, for `blueprintctl outputs`
    pub fn stage_outputs(&self, stage_dir: &std::path::Path) -> Result<serde_json::Value> {
        let blueprint = Blueprint::new(
            self.runner.clone(),
            self.base_options(stage_dir.to_path_buf()),
        );
        blueprint.output_values()
    }
}

#[derive(Debug, Clone, Copy)]
enum EnvOp {
    Test,
    Verify,
    Destroy,
}
