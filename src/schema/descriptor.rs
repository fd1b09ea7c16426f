//! Descriptor format parsed from each `<message-type>-data.json` file:
//!
//! ```json
//! { "required": ["up", "aimAngle"], "fields": { "up": "bool", "aimAngle": "number" } }
//! ```
//!
//! Deliberately small — presence plus JSON-type checking, nothing like full
//! JSON-Schema (no patterns, no ranges, no nested schemas). Good enough for
//! the boundary-validation role this is asked to play.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Bool,
    Array,
    Object,
    Any,
}

impl FieldType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(FieldType::String),
            "number" => Some(FieldType::Number),
            "bool" | "boolean" => Some(FieldType::Bool),
            "array" => Some(FieldType::Array),
            "object" => Some(FieldType::Object),
            "any" => Some(FieldType::Any),
            _ => None,
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Descriptor {
    required: Vec<String>,
    fields: Vec<(String, FieldType)>,
}

impl Descriptor {
    /// `path` is only used for error messages.
    pub fn from_value(path: &str, value: &Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("{path}: descriptor root must be a JSON object"))?;

        let required = match object.get("required") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| format!("{path}: `required` entries must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(format!("{path}: `required` must be an array")),
            None => Vec::new(),
        };

        let fields = match object.get("fields") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, ty)| {
                    let raw = ty
                        .as_str()
                        .ok_or_else(|| format!("{path}: field `{name}` type must be a string"))?;
                    let parsed = FieldType::parse(raw)
                        .ok_or_else(|| format!("{path}: field `{name}` has unknown type `{raw}`"))?;
                    Ok((name.clone(), parsed))
                })
                .collect::<Result<Vec<_>, String>>()?,
            Some(_) => return Err(format!("{path}: `fields` must be an object")),
            None => Vec::new(),
        };

        Ok(Self { required, fields })
    }

    /// Returns `Err(reason)` describing the first violation found.
    pub fn validate(&self, data: &Value) -> Result<(), String> {
        let object = data.as_object().ok_or_else(|| "payload must be a JSON object".to_string())?;

        for name in &self.required {
            if !object.contains_key(name) {
                return Err(format!("missing required field `{name}`"));
            }
        }

        for (name, expected) in &self.fields {
            if let Some(value) = object.get(name)
                && !expected.matches(value)
            {
                return Err(format!("field `{name}` has the wrong type"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_required_field() {
        let descriptor = Descriptor::from_value(
            "test",
            &serde_json::json!({ "required": ["aimAngle"], "fields": { "aimAngle": "number" } }),
        )
        .unwrap();
        let err = descriptor.validate(&serde_json::json!({})).unwrap_err();
        assert!(err.contains("aimAngle"));
    }

    #[test]
    fn rejects_wrong_type() {
        let descriptor = Descriptor::from_value(
            "test",
            &serde_json::json!({ "fields": { "sequence": "number" } }),
        )
        .unwrap();
        let err = descriptor.validate(&serde_json::json!({ "sequence": "not a number" })).unwrap_err();
        assert!(err.contains("sequence"));
    }

    #[test]
    fn accepts_well_formed_payload() {
        let descriptor = Descriptor::from_value(
            "test",
            &serde_json::json!({ "required": ["up"], "fields": { "up": "bool" } }),
        )
        .unwrap();
        assert!(descriptor.validate(&serde_json::json!({ "up": true })).is_ok());
    }
}
