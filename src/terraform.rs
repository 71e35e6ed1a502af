//! Terraform CLI wrapper
//!
//! Wraps init/plan/apply/destroy/output for a single stage directory.
//! Outputs are read with `terraform output -json` and exposed through typed
//! accessors on the parsed document.

use crate::error::{BlueprintError, Result};
use crate::exec::{CommandRunner, CommandSpec};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Invocation options shared by every terraform command for a stage
#[derive(Debug, Clone)]
pub struct TerraformOptions {
    pub binary: String,
    pub dir: PathBuf,
    /// `-backend-config=key=value` pairs passed to init
    pub backend_config: BTreeMap<String, String>,
    /// `-var key=value` pairs passed to plan/apply/destroy
    pub vars: BTreeMap<String, String>,
    /// Extra process environment (credential impersonation lives here)
    pub env: BTreeMap<String, String>,
}

impl TerraformOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "terraform".to_string(),
            dir: dir.into(),
            backend_config: BTreeMap::new(),
            vars: BTreeMap::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_backend_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.backend_config.insert(key.into(), value.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Terraform command executor for one stage directory
pub struct Terraform {
    runner: Arc<dyn CommandRunner>,
    options: TerraformOptions,
}

impl Terraform {
    pub fn new(runner: Arc<dyn CommandRunner>, options: TerraformOptions) -> Self {
        Self { runner, options }
    }

    pub fn options(&self) -> &TerraformOptions {
        &self.options
    }

    fn dir_label(&self) -> String {
        self.options.dir.display().to_string()
    }

    fn base_spec(&self) -> CommandSpec {
        CommandSpec::new(&self.options.binary)
            .cwd(&self.options.dir)
            .envs(&self.options.env)
    }

    fn run(&self, operation: &str, spec: CommandSpec) -> Result<String> {
        let output = self.runner.run(&spec)?;
        if !output.success {
            return Err(BlueprintError::Terraform {
                operation: operation.to_string(),
                dir: self.dir_label(),
                message: output.combined_error(),
                source: None,
            });
        }
        Ok(output.stdout)
    }

    fn var_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (key, value) in &self.options.vars {
            args.push("-var".to_string());
            args.push(format!("{}={}", key, value));
        }
        args
    }

    pub fn init(&self) -> Result<()> {
        info!("terraform init: {}", self.dir_label());
        let mut spec = self.base_spec().args(["init", "-input=false", "-reconfigure"]);
        for (key, value) in &self.options.backend_config {
            spec = spec.arg(format!("-backend-config={}={}", key, value));
        }
        self.run("init", spec)?;
        Ok(())
    }

    pub fn plan(&self, out_file: Option<&Path>) -> Result<()> {
        info!("terraform plan: {}", self.dir_label());
        let mut spec = self.base_spec().args(["plan", "-input=false"]);
        if let Some(out) = out_file {
            spec = spec.arg(format!("-out={}", out.display()));
        }
        spec = spec.args(self.var_args());
        self.run("plan", spec)?;
        Ok(())
    }

    pub fn apply(&self) -> Result<()> {
        info!("terraform apply: {}", self.dir_label());
        let spec = self
            .base_spec()
            .args(["apply", "-input=false", "-auto-approve"])
            .args(self.var_args());
        self.run("apply", spec)?;
        Ok(())
    }

    pub fn destroy(&self) -> Result<()> {
        info!("terraform destroy: {}", self.dir_label());
        let spec = self
            .base_spec()
            .args(["destroy", "-input=false", "-auto-approve"])
            .args(self.var_args());
        self.run("destroy", spec)?;
        Ok(())
    }

    /// Render a saved plan file as JSON (for policy vetting)
    pub fn show_plan_json(&self, plan_file: &Path) -> Result<String> {
        let spec = self
            .base_spec()
            .args(["show", "-json"])
            .arg(plan_file.display().to_string());
        self.run("show", spec)
    }

    /// Fetch the full output document: `{name: {value, type, sensitive}}`
    pub fn output_document(&self) -> Result<Outputs> {
        let stdout = self.run("output", self.base_spec().args(["output", "-json"]))?;
        let doc: Value = serde_json::from_str(&stdout).map_err(|e| BlueprintError::Terraform {
            operation: "output".to_string(),
            dir: self.dir_label(),
            message: format!("output -json produced invalid JSON: {}", e),
            source: Some(Box::new(e)),
        })?;
        Ok(Outputs {
            doc,
            dir: self.dir_label(),
        })
    }
}

/// Parsed `terraform output -json` document with typed access
#[derive(Debug, Clone)]
pub struct Outputs {
    doc: Value,
    dir: String,
}

impl Outputs {
    /// The raw `value` field of a named output
    pub fn raw(&self, name: &str) -> Result<&Value> {
        self.doc
            .get(name)
            .and_then(|entry| entry.get("value"))
            .ok_or_else(|| BlueprintError::OutputMissing {
                name: name.to_string(),
                dir: self.dir.clone(),
            })
    }

    pub fn string(&self, name: &str) -> Result<String> {
        let value = self.raw(name)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BlueprintError::OutputType {
                name: name.to_string(),
                expected: "string".to_string(),
            })
    }

    pub fn map(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let value = self.raw(name)?;
        let object = value.as_object().ok_or_else(|| BlueprintError::OutputType {
            name: name.to_string(),
            expected: "map of strings".to_string(),
        })?;
        let mut result = BTreeMap::new();
        for (key, entry) in object {
            let s = entry.as_str().ok_or_else(|| BlueprintError::OutputType {
                name: name.to_string(),
                expected: "map of strings".to_string(),
            })?;
            result.insert(key.clone(), s.to_string());
        }
        Ok(result)
    }

    pub fn list(&self, name: &str) -> Result<Vec<String>> {
        let value = self.raw(name)?;
        let items = value.as_array().ok_or_else(|| BlueprintError::OutputType {
            name: name.to_string(),
            expected: "list of strings".to_string(),
        })?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| BlueprintError::OutputType {
                        name: name.to_string(),
                        expected: "list of strings".to_string(),
                    })
            })
            .collect()
    }

    /// The whole document with the `{value, type, sensitive}` wrappers
    /// stripped: `{name: value}`
    pub fn values(&self) -> Value {
        let mut doc = serde_json::Map::new();
        if let Some(entries) = self.doc.as_object() {
            for (name, entry) in entries {
                if let Some(value) = entry.get("value") {
                    doc.insert(name.clone(), value.clone());
                }
            }
        }
        Value::Object(doc)
    }

    /// First element of a list output; empty lists are a shape error, the
    /// stage is expected to have provisioned at least one
    pub fn first(&self, name: &str) -> Result<String> {
        let items = self.list(name)?;
        items
            .into_iter()
            .next()
            .ok_or_else(|| BlueprintError::OutputType {
                name: name.to_string(),
                expected: "non-empty list".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records specs and replays canned outputs
    struct FakeRunner {
        calls: Mutex<Vec<CommandSpec>>,
        stdout: String,
        success: bool,
    }

    impl FakeRunner {
        fn new(stdout: &str, success: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                stdout: stdout.to_string(),
                success,
            }
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            Ok(CommandOutput {
                stdout: self.stdout.clone(),
                stderr: if self.success { String::new() } else { "boom".to_string() },
                success: self.success,
            })
        }
    }

    fn outputs_fixture() -> Outputs {
        let doc = json!({
            "project_id": { "sensitive": false, "type": "string", "value": "prj-bu1-dev-sample" },
            "state_buckets": {
                "sensitive": false,
                "type": ["map", "string"],
                "value": { "bu1-example-app": "bkt-bu1-app-state" }
            },
            "instances_names": {
                "sensitive": false,
                "type": ["list", "string"],
                "value": ["sample-vm-001", "sample-vm-002"]
            },
            "empty_list": { "sensitive": false, "type": ["list", "string"], "value": [] }
        });
        Outputs {
            doc,
            dir: "5-app-infra/business_unit_1/development".to_string(),
        }
    }

    #[test]
    fn test_output_string() {
        let outputs = outputs_fixture();
        assert_eq!(outputs.string("project_id").unwrap(), "prj-bu1-dev-sample");
    }

    #[test]
    fn test_output_missing() {
        let outputs = outputs_fixture();
        let err = outputs.string("nope").unwrap_err();
        assert!(matches!(err, BlueprintError::OutputMissing { .. }));
    }

    #[test]
    fn test_output_wrong_type() {
        let outputs = outputs_fixture();
        let err = outputs.string("state_buckets").unwrap_err();
        assert!(matches!(err, BlueprintError::OutputType { .. }));
    }

    #[test]
    fn test_output_map() {
        let outputs = outputs_fixture();
        let buckets = outputs.map("state_buckets").unwrap();
        assert_eq!(
            buckets.get("bu1-example-app").map(String::as_str),
            Some("bkt-bu1-app-state")
        );
    }

    #[test]
    fn test_output_list_and_first() {
        let outputs = outputs_fixture();
        let names = outputs.list("instances_names").unwrap();
        assert_eq!(names, vec!["sample-vm-001", "sample-vm-002"]);
        assert_eq!(outputs.first("instances_names").unwrap(), "sample-vm-001");

        let err = outputs.first("empty_list").unwrap_err();
        assert!(matches!(err, BlueprintError::OutputType { .. }));
    }

    #[test]
    fn test_init_passes_backend_config() {
        let runner = Arc::new(FakeRunner::new("", true));
        let options = TerraformOptions::new("/stage")
            .with_backend_config("bucket", "bkt-state")
            .with_env("GOOGLE_IMPERSONATE_SERVICE_ACCOUNT", "sa@p.iam");
        let tf = Terraform::new(runner.clone(), options);
        tf.init().unwrap();

        let calls = runner.calls.lock().unwrap();
        let spec = &calls[0];
        assert_eq!(spec.args[0], "init");
        assert!(spec.args.contains(&"-backend-config=bucket=bkt-state".to_string()));
        assert_eq!(
            spec.env.get("GOOGLE_IMPERSONATE_SERVICE_ACCOUNT").map(String::as_str),
            Some("sa@p.iam")
        );
    }

    #[test]
    fn test_apply_passes_vars() {
        let runner = Arc::new(FakeRunner::new("", true));
        let options =
            TerraformOptions::new("/stage").with_var("remote_state_bucket", "bkt-tfstate");
        let tf = Terraform::new(runner.clone(), options);
        tf.apply().unwrap();

        let calls = runner.calls.lock().unwrap();
        let args = &calls[0].args;
        assert!(args.contains(&"-auto-approve".to_string()));
        let var_pos = args.iter().position(|a| a == "-var").unwrap();
        assert_eq!(args[var_pos + 1], "remote_state_bucket=bkt-tfstate");
    }

    #[test]
    fn test_failed_command_maps_to_terraform_error() {
        let runner = Arc::new(FakeRunner::new("", false));
        let tf = Terraform::new(runner, TerraformOptions::new("/stage"));
        let err = tf.apply().unwrap_err();
        match err {
            BlueprintError::Terraform { operation, message, .. } => {
                assert_eq!(operation, "apply");
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_output_document_parses() {
        let doc = json!({
            "project_id": { "sensitive": false, "type": "string", "value": "prj-x" }
        });
        let runner = Arc::new(FakeRunner::new(&doc.to_string(), true));
        let tf = Terraform::new(runner, TerraformOptions::new("/stage"));
        let outputs = tf.output_document().unwrap();
        assert_eq!(outputs.string("project_id").unwrap(), "prj-x");
    }

    #[test]
    fn test_output_document_invalid_json() {
        let runner = Arc::new(FakeRunner::new("not json", true));
        let tf = Terraform::new(runner, TerraformOptions::new("/stage"));
        assert!(tf.output_document().is_err());
    }
}
