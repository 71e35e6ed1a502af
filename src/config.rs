use crate::error::BlueprintError;
use crate::validation;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub foundation: FoundationConfig,
    pub terraform: TerraformConfig,
    pub gcloud: GcloudConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundationConfig {
    /// Root of the foundation checkout (the directory containing 0-bootstrap,
    /// 4-projects, 5-app-infra). Supports `~` expansion.
    pub root_dir: String,
    /// Business unit subdirectory, e.g. "business_unit_1"
    pub business_unit: String,
    /// Application key used in the shared stage output maps
    pub app_key: String,
    /// Environments verified by `test`/`verify`
    pub environments: Vec<String>,
    /// Policy library for `gcloud beta terraform vet` (skipped when unset)
    pub policy_library_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformConfig {
    /// Terraform binary name or absolute path
    pub binary: String,
    /// Extra environment variables set on every terraform process,
    /// e.g. `TF_PLUGIN_CACHE_DIR`
    #[serde(default)]
    pub extra_env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcloudConfig {
    /// gcloud binary name or absolute path
    pub binary: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            foundation: FoundationConfig {
                root_dir: ".".to_string(),
                business_unit: "business_unit_1".to_string(),
                app_key: "bu1-example-app".to_string(),
                environments: vec![
                    "development".to_string(),
                    "nonproduction".to_string(),
                    "production".to_string(),
                ],
                policy_library_path: None,
            },
            terraform: TerraformConfig {
                binary: "terraform".to_string(),
                extra_env: BTreeMap::new(),
            },
            gcloud: GcloudConfig {
                binary: "gcloud".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            // Try .blueprintctl.toml in current dir, then ~/.config/blueprintctl/config.toml
            let local = PathBuf::from(".blueprintctl.toml");
            if local.exists() {
                local
            } else {
                dirs::config_dir()
                    .map(|d| d.join("blueprintctl").join("config.toml"))
                    .unwrap_or_else(|| PathBuf::from(".blueprintctl.toml"))
            }
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
            let config: Config = toml::from_str(&content).with_context(|| {
                let mut err = format!("Failed to parse config: {}", config_path.display());
                err.push_str("\n  Common issues:");
                err.push_str("\n    - Invalid TOML syntax");
                err.push_str("\n    - Missing required fields");
                err.push_str("\n    - Incorrect value types");
                err.push_str("\n  Tip: Run 'blueprintctl init' to create a new config file");
                err
            })?;
            config
                .validate()
                .with_context(|| format!("Invalid config: {}", config_path.display()))?;
            Ok(config)
        } else {
            // Use defaults but warn if user explicitly provided a path
            if path.is_some() {
                eprintln!("WARNING: Config file not found: {}", config_path.display());
                eprintln!("   Using default configuration. Run 'blueprintctl init' to create a config file.");
            }
            Ok(Config::default())
        }
    }

    /// Reject broken values before any terraform or gcloud process is spawned
    pub fn validate(&self) -> crate::error::Result<()> {
        validation::validate_business_unit(&self.foundation.business_unit)?;
        if self.foundation.environments.is_empty() {
            return Err(BlueprintError::Validation {
                field: "environments".to_string(),
                reason: "at least one environment must be configured".to_string(),
            });
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Foundation root with `~` expanded
    pub fn foundation_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.foundation.root_dir).into_owned())
    }

    /// Stage directory helpers relative to the foundation root
    pub fn bootstrap_dir(&self) -> PathBuf {
        self.foundation_root().join("0-bootstrap")
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.foundation_root()
            .join("4-projects")
            .join(&self.foundation.business_unit)
            .join("shared")
    }

    pub fn projects_dir(&self, env: &str) -> PathBuf {
        self.foundation_root()
            .join("4-projects")
            .join(&self.foundation.business_unit)
            .join(env)
    }

    pub fn app_infra_dir(&self, env: &str) -> PathBuf {
        self.foundation_root()
            .join("5-app-infra")
            .join(&self.foundation.business_unit)
            .join(env)
    }
}

pub fn init_config(output: &Path) -> Result<()> {
    let config = Config::default();
    config.save(output)?;
    println!("Created config file: {}", output.display());
    Ok(())
}
