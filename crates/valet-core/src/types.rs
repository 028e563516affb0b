//! Inbound envelope types and operation naming.
//!
//! The envelope mirrors what the orchestrator sends: a handful of
//! datacenter/tenant/VNF identifiers plus an embedded Heat request.
//! Template bodies stay as raw `serde_json::Value` because they may arrive
//! either as YAML text or as an already-parsed document.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Envelope fields that must be present and non-empty before a create or
/// update is resolved.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "region_id",
    "keystone_url",
    "tenant_id",
    "service_instance_id",
    "vnf_id",
    "vnf_name",
    "vf_module_id",
    "vf_module_name",
];

/// A placement create/update request as received on the wire.
///
/// Identifier fields keep their JSON value: the engine receives them as
/// sent, and only absent, `null` or `""` values count as missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlacementEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystone_url: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_instance_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnf_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnf_name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vf_module_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vf_module_name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heat_request: Option<HeatRequest>,
}

impl PlacementEnvelope {
    /// Look up an identifier field by its wire name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        let value = match name {
            "region_id" => &self.region_id,
            "keystone_url" => &self.keystone_url,
            "tenant_id" => &self.tenant_id,
            "service_instance_id" => &self.service_instance_id,
            "vnf_id" => &self.vnf_id,
            "vnf_name" => &self.vnf_name,
            "vf_module_id" => &self.vf_module_id,
            "vf_module_name" => &self.vf_module_name,
            "stack_name" => &self.stack_name,
            _ => return None,
        };
        value.as_ref()
    }
}

/// The Heat stack request embedded in a placement envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HeatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_name: Option<String>,
    /// Top-level HOT template, YAML text or document.
    #[serde(default)]
    pub template: Value,
    /// Nested templates keyed by the name used in `type`/`resource_def`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Map<String, Value>,
    /// Heat environment (`parameters` section), YAML text or document.
    #[serde(default)]
    pub environment: Value,
    /// Caller-supplied parameter values.
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Map<String, Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Operations accepted by the placement engine. The operation name
/// prefixes the request id to form the store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Confirm,
    Rollback,
    GroupQuery,
    GroupCreate,
    GroupUpdate,
    GroupDelete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Confirm => "confirm",
            Operation::Rollback => "rollback",
            Operation::GroupQuery => "group_query",
            Operation::GroupCreate => "group_create",
            Operation::GroupUpdate => "group_update",
            Operation::GroupDelete => "group_delete",
        }
    }

    /// Store key for this operation: `{operation}-{request_id}`.
    pub fn request_key(&self, request_id: &str) -> String {
        format!("{}-{request_id}", self.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Escape the HTML-significant characters of a caller-supplied id.
pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
