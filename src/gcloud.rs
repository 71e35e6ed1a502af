//! gcloud CLI wrapper
//!
//! Runs read-only describe commands and returns the parsed JSON document.
//! Common args (`--project`, `--zone`) are configured once per scope;
//! `--format json` is always appended.

use crate::error::{BlueprintError, Result};
use crate::exec::{CommandRunner, CommandSpec};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct Gcloud {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    common_args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl Gcloud {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            binary: "gcloud".to_string(),
            common_args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Args appended to every command, e.g. `--project`, `--zone`
    pub fn with_common_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.common_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Execute `gcloud <command> <common args> --format json` and parse stdout
    ///
    /// The command string is split on whitespace; arguments with embedded
    /// spaces are not needed for describe commands.
    pub fn run(&self, command: &str) -> Result<Value> {
        debug!("gcloud {}", command);
        let mut spec = CommandSpec::new(&self.binary)
            .args(command.split_whitespace())
            .args(self.common_args.iter().cloned());
        if !self.common_args.iter().any(|a| a == "--format") {
            spec = spec.args(["--format", "json"]);
        }
        spec = spec.envs(&self.env);

        let output = self.runner.run(&spec)?;
        if !output.success {
            return Err(BlueprintError::Gcloud {
                command: command.to_string(),
                message: output.combined_error(),
                source: None,
            });
        }

        serde_json::from_str(&output.stdout).map_err(|e| BlueprintError::Gcloud {
            command: command.to_string(),
            message: format!("expected JSON output, got: {}", truncate(&output.stdout, 200)),
            source: Some(Box::new(e)),
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
