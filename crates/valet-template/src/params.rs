//! Parameter resolution across the three value scopes.
//!
//! Lookup order for a `get_param` key, first hit wins:
//!
//! 1. host-assignment marker as root: the key itself
//! 2. properties injected by the enclosing resource
//! 3. caller request parameters (all-blank sequences count as absent)
//! 4. environment parameters
//! 5. availability-zone marker as root: `"None"`

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::heat::{AZ_MARKER, HOST_ASSIGNMENT_MARKER, UNRESOLVED_AZ};
use crate::property::is_self_reference;

/// Resolve `key`, indexing into a sequence value when `index` is given.
pub fn resolve_param(
    key: &str,
    environment: &Map<String, Value>,
    parent: Option<&Map<String, Value>>,
    request: &Map<String, Value>,
    root_key: &str,
    index: Option<usize>,
) -> Option<Value> {
    if root_key == HOST_ASSIGNMENT_MARKER {
        return Some(Value::String(key.to_string()));
    }

    if let Some(value) = parent.and_then(|p| p.get(key)).filter(|v| is_present(v)) {
        if is_self_reference(value, key) {
            return resolve_param(key, environment, None, request, root_key, index);
        }
        debug!(key, "parameter found in parent properties");
        return select(key, value, index);
    }

    if let Some(value) = request
        .get(key)
        .filter(|v| is_present(v) && !is_blank_sequence(v))
    {
        debug!(key, "parameter found in request parameters");
        return select(key, value, index);
    }

    if let Some(value) = environment.get(key).filter(|v| is_present(v)) {
        debug!(key, "parameter found in environment");
        return select(key, value, index);
    }

    if root_key == AZ_MARKER {
        return Some(Value::String(UNRESOLVED_AZ.to_string()));
    }
    None
}

/// Resolve with `root_key = key` and no index.
pub fn resolve_param_plain(
    key: &str,
    environment: &Map<String, Value>,
    parent: Option<&Map<String, Value>>,
    request: &Map<String, Value>,
) -> Option<Value> {
    resolve_param(key, environment, parent, request, key, None)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// A sequence whose every element is the empty string. An empty sequence
/// counts as blank too.
fn is_blank_sequence(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(|item| item.as_str() == Some("")),
        _ => false,
    }
}

fn select(key: &str, value: &Value, index: Option<usize>) -> Option<Value> {
    match (index, value) {
        (Some(i), Value::Array(items)) => {
            let item = items.get(i).cloned();
            if item.is_none() {
                warn!(key, index = i, len = items.len(), "parameter index out of range");
            }
            item
        }
        _ => Some(value.clone()),
    }
}
