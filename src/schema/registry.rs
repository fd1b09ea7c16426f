//! Eager, deterministic schema loading: every descriptor under
//! `schema_dir` is read once at construction time; a missing file named
//! in `required` is a fatal startup error, never a lazy lookup failure
//! discovered mid-dispatch. Read-only after construction, so one
//! `Arc<SchemaRegistry>` is shared across every session without locking.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::SchemaError;
use crate::schema::descriptor::Descriptor;

pub struct SchemaRegistry {
    descriptors: HashMap<String, Descriptor>,
}

impl SchemaRegistry {
    /// Schema files are named `<schema-name>.json` directly under `dir`,
    /// e.g. `input:state-data.json`. `required` names every schema that
    /// must be present for the server to start at all.
    pub fn load(dir: &Path, required: &[&str]) -> Result<Self, SchemaError> {
        let mut descriptors = HashMap::new();

        let entries = fs::read_dir(dir).map_err(|e| SchemaError::MalformedDescriptor {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| SchemaError::MalformedDescriptor {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| SchemaError::MalformedDescriptor {
                    path: path.display().to_string(),
                    reason: "non-UTF8 file name".to_string(),
                })?
                .to_string();

            let raw = fs::read_to_string(&path).map_err(|e| SchemaError::MalformedDescriptor {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let value: Value = serde_json::from_str(&raw).map_err(|e| SchemaError::MalformedDescriptor {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let descriptor = Descriptor::from_value(&path.display().to_string(), &value).map_err(|reason| {
                SchemaError::MalformedDescriptor { path: path.display().to_string(), reason }
            })?;

            descriptors.insert(name, descriptor);
        }

        for name in required {
            if !descriptors.contains_key(*name) {
                return Err(SchemaError::MissingRequired { name: name.to_string() });
            }
        }

        Ok(Self { descriptors })
    }

    /// Used by tests that want a registry without touching the filesystem.
    pub fn from_descriptors(descriptors: HashMap<String, Descriptor>) -> Self {
        Self { descriptors }
    }

    pub fn validate(&self, name: &str, data: &Value) -> Result<(), SchemaError> {
        let descriptor = self
            .descriptors
            .get(name)
            .ok_or_else(|| SchemaError::UnknownSchema { name: name.to_string() })?;
        descriptor
            .validate(data)
            .map_err(|reason| SchemaError::Invalid { name: name.to_string(), reason })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::descriptor::Descriptor;

    #[test]
    fn unknown_schema_name_is_distinguished_from_invalid_payload() {
        let mut map = HashMap::new();
        map.insert(
            "input:state-data".to_string(),
            Descriptor::from_value("test", &serde_json::json!({ "required": ["sequence"] })).unwrap(),
        );
        let registry = SchemaRegistry::from_descriptors(map);

        let err = registry.validate("bogus", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownSchema { .. }));

        let err = registry.validate("input:state-data", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, SchemaError::Invalid { .. }));
    }
}
