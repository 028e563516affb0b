//! YAML/JSON normalization of template documents.

use serde_json::Value;

use crate::error::{TemplateError, TemplateResult};

/// Turn a template document into a JSON value.
///
/// Strings are parsed as YAML (JSON text is valid YAML, so both work);
/// mappings are taken as already parsed.
pub fn normalize(document: &Value, source_name: &str) -> TemplateResult<Value> {
    match document {
        Value::String(text) if text.trim().is_empty() => Ok(Value::Object(Default::default())),
        Value::String(text) => {
            let parsed: Value =
                serde_yaml::from_str(text).map_err(|e| TemplateError::Yaml {
                    source_name: source_name.to_string(),
                    message: e.to_string(),
                })?;
            match parsed {
                Value::Object(_) => Ok(parsed),
                Value::Null => Ok(Value::Object(Default::default())),
                other => Err(TemplateError::NotAMapping(format!(
                    "{source_name}: {}",
                    type_name(&other)
                ))),
            }
        }
        Value::Object(_) => Ok(document.clone()),
        Value::Null => Ok(Value::Object(Default::default())),
        other => Err(TemplateError::NotAMapping(format!(
            "{source_name}: {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
