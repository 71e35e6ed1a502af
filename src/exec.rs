//! Subprocess execution seam
//!
//! Terraform and gcloud are both consumed as external binaries. Everything
//! above this module talks to a `CommandRunner` so the lifecycle and
//! verification layers can be exercised against fake binaries in tests.

use crate::error::{BlueprintError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// A fully-specified subprocess invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Extra environment (e.g. GOOGLE_IMPERSONATE_SERVICE_ACCOUNT), applied
    /// on top of the inherited environment
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// Captured result of a finished subprocess
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    /// stderr, falling back to stdout when stderr is empty (terraform and
    /// gcloud both write diagnostics to either stream depending on the
    /// subcommand)
    pub fn combined_error(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            format!("{}\n{}", self.stderr.trim(), self.stdout.trim())
                .trim()
                .to_string()
        }
    }
}

/// Trait for running subprocesses
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands on the host via `std::process::Command`
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!("exec: {} {}", spec.program, spec.args.join(" "));

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(|e| {
            BlueprintError::Io(std::io::Error::other(format!(
                "Failed to execute {}: {}",
                spec.program, e
            )))
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }
}

/// Resolve a binary name to a path, with an actionable error when missing
pub fn require_binary(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| BlueprintError::Validation {
        field: "binary".to_string(),
        reason: format!(
            "'{}' not found on PATH. Install it or point the config at an absolute path.",
            name
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_builder() {
        let mut env = BTreeMap::new();
        env.insert("FOO".to_string(), "bar".to_string());

        let spec = CommandSpec::new("terraform")
            .arg("output")
            .args(["-json"])
            .cwd("/tmp")
            .envs(&env);

        assert_eq!(spec.program, "terraform");
        assert_eq!(spec.args, vec!["output", "-json"]);
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(spec.env.get("FOO").map(String::as_str), Some("bar"));
    }

    #[test]
    fn test_combined_error_prefers_stderr() {
        let out = CommandOutput {
            stdout: "plan output".to_string(),
            stderr: "Error: bucket does not exist".to_string(),
            success: false,
        };
        assert!(out.combined_error().starts_with("Error: bucket"));

        let quiet = CommandOutput {
            stdout: "only stdout".to_string(),
            stderr: "  ".to_string(),
            success: false,
        };
        assert_eq!(quiet.combined_error(), "only stdout");
    }

    #[test]
    fn test_system_runner_echo() {
        let runner = SystemRunner;
        let out = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo hello"]))
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_system_runner_failure_status() {
        let runner = SystemRunner;
        let out = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo broken >&2; exit 3"]))
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.combined_error(), "broken");
    }

    #[test]
    fn test_system_runner_missing_binary() {
        let runner = SystemRunner;
        let result = runner.run(&CommandSpec::new("definitely-not-a-binary-xyz"));
        assert!(result.is_err());
    }
}
