//! Assembly of caller-facing responses from engine result rows.
//!
//! A result row carries `request_id`, `timestamp`, `status` (a JSON
//! document, usually as text) and `result` (the engine's parameter
//! assignments, usually as text).

use serde_json::{Map, Value};
use tracing::warn;

/// Row columns that are bookkeeping only.
const BOOKKEEPING: [&str; 4] = ["timestamp", "result", "request_id", "status"];

/// A delivered response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

/// Response for create/update: the engine's result merged over the
/// caller's parameters, plus the parsed status.
pub fn placement_response(row: Value, request_parameters: &Map<String, Value>) -> ResponseBody {
    let status = embedded_json(row.get("status"));
    if status.get("status").and_then(Value::as_str) == Some("failed") {
        return status_only(status);
    }

    let result = match embedded_json(row.get("result")) {
        Value::Object(result) => result,
        _ => {
            warn!(%row, "result row carries an unparsable result");
            return ResponseBody::Text(format!("Invalid response : {row}"));
        }
    };

    let mut parameters = request_parameters.clone();
    parameters.extend(result);

    let mut response = match row {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for column in BOOKKEEPING {
        response.remove(column);
    }
    response.insert("parameters".to_string(), Value::Object(parameters));
    response.insert("status".to_string(), status);
    ResponseBody::Json(Value::Object(response))
}

/// Response for operations without parameters: `{status: ...}`.
pub fn status_response(row: &Value) -> ResponseBody {
    status_only(embedded_json(row.get("status")))
}

fn status_only(status: Value) -> ResponseBody {
    let mut body = Map::new();
    body.insert("status".to_string(), status);
    ResponseBody::Json(Value::Object(body))
}

/// Decode a column that may hold JSON text. Text that does not parse is
/// kept as a string.
fn embedded_json(column: Option<&Value>) -> Value {
    match column {
        Some(Value::String(text)) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        Some(other) => other.clone(),
        None => Value::Null,
    }
}
