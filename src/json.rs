//! Dotted-path access into gcloud/terraform JSON documents
//!
//! Resource describe documents are deep and mostly read at fixed paths
//! ("confidentialInstanceConfig.enableConfidentialCompute",
//! "serviceAccounts.0.email"). `JsonQuery` gives `serde_json::Value` a small
//! path-query surface so verification code stays flat. Absent paths read as
//! `None` / empty, never panic.

use serde_json::Value;

pub trait JsonQuery {
    /// Navigate a dotted path of object keys and array indices
    fn at(&self, path: &str) -> Option<&Value>;

    /// String at path, empty string when absent or not a string
    fn str_at(&self, path: &str) -> &str;

    /// Bool at path, false when absent or not a bool
    fn bool_at(&self, path: &str) -> bool;

    /// Array at path, empty slice when absent or not an array
    fn array_at(&self, path: &str) -> &[Value];

    /// Array length at path, 0 when absent
    fn len_at(&self, path: &str) -> usize;
}

impl JsonQuery for Value {
    fn at(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        if path.is_empty() {
            return Some(current);
        }
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => {
                    let idx: usize = segment.parse().ok()?;
                    items.get(idx)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    fn str_at(&self, path: &str) -> &str {
        self.at(path).and_then(Value::as_str).unwrap_or("")
    }

    fn bool_at(&self, path: &str) -> bool {
        self.at(path).and_then(Value::as_bool).unwrap_or(false)
    }

    fn array_at(&self, path: &str) -> &[Value] {
        self.at(path).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
    }

    fn len_at(&self, path: &str) -> usize {
        self.array_at(path).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance_doc() -> Value {
        json!({
            "name": "sample-vm-001",
            "machineType": "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a/machineTypes/f1-micro",
            "confidentialInstanceConfig": {
                "enableConfidentialCompute": true,
                "confidentialInstanceType": "SEV"
            },
            "scheduling": { "onHostMaintenance": "MIGRATE" },
            "serviceAccounts": [
                { "email": "sa@p.iam.gserviceaccount.com", "scopes": ["cloud-platform"] }
            ]
        })
    }

    #[test]
    fn test_at_nested_object() {
        let doc = instance_doc();
        assert_eq!(
            doc.str_at("confidentialInstanceConfig.confidentialInstanceType"),
            "SEV"
        );
        assert_eq!(doc.str_at("scheduling.onHostMaintenance"), "MIGRATE");
    }

    #[test]
    fn test_at_array_index() {
        let doc = instance_doc();
        assert_eq!(
            doc.str_at("serviceAccounts.0.email"),
            "sa@p.iam.gserviceaccount.com"
        );
        assert_eq!(doc.str_at("serviceAccounts.0.scopes.0"), "cloud-platform");
        assert!(doc.at("serviceAccounts.1").is_none());
    }

    #[test]
    fn test_bool_and_len() {
        let doc = instance_doc();
        assert!(doc.bool_at("confidentialInstanceConfig.enableConfidentialCompute"));
        assert!(!doc.bool_at("confidentialInstanceConfig.missing"));
        assert_eq!(doc.len_at("serviceAccounts"), 1);
        assert_eq!(doc.len_at("name"), 0);
    }

    #[test]
    fn test_absent_paths_are_safe() {
        let doc = instance_doc();
        assert_eq!(doc.str_at("no.such.path"), "");
        assert!(doc.at("serviceAccounts.notanumber").is_none());
        assert_eq!(doc.array_at("scheduling"), &[] as &[Value]);
    }

    #[test]
    fn test_empty_path_is_root() {
        let doc = instance_doc();
        assert_eq!(doc.at("").and_then(|v| v.at("name")), doc.at("name"));
    }
}
