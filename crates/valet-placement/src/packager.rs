//! Packaging of resolved templates into engine requests and row-store
//! envelopes.

use serde::Serialize;
use serde_json::{Map, Value, json};
use valet_core::{PlacementEnvelope, epoch_millis};

/// The request document the placement engine reads from `requests`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlacementRequest {
    pub datacenter: Datacenter,
    pub tenant_id: Option<Value>,
    pub service_instance_id: Option<Value>,
    pub vnf_instance_id: Option<Value>,
    pub vnf_instance_name: Option<Value>,
    pub vf_module_id: Option<Value>,
    pub vf_module_name: Option<Value>,
    pub stack: Stack,
    pub stack_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Datacenter {
    pub id: Option<Value>,
    pub url: Option<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Stack {
    pub resources: Map<String, Value>,
}

impl PlacementRequest {
    /// Combine envelope identifiers with the resolved resource map. The
    /// stack name comes from the embedded Heat request.
    pub fn assemble(envelope: &PlacementEnvelope, resources: Map<String, Value>) -> Self {
        Self {
            datacenter: Datacenter {
                id: envelope.region_id.clone(),
                url: envelope.keystone_url.clone(),
            },
            tenant_id: envelope.tenant_id.clone(),
            service_instance_id: envelope.service_instance_id.clone(),
            vnf_instance_id: envelope.vnf_id.clone(),
            vnf_instance_name: envelope.vnf_name.clone(),
            vf_module_id: envelope.vf_module_id.clone(),
            vf_module_name: envelope.vf_module_name.clone(),
            stack: Stack { resources },
            stack_name: envelope
                .heat_request
                .as_ref()
                .and_then(|heat| heat.stack_name.clone()),
        }
    }
}

/// Row-store insert document for `requests`.
pub fn insert_envelope(request_key: &str, request: &Value) -> Value {
    json!({
        "values": {
            "request_id": request_key,
            "timestamp": epoch_millis(),
            "request": request.to_string(),
        },
        "consistencyInfo": {"type": "eventual"}
    })
}

/// Row-store delete document.
pub fn delete_envelope() -> Value {
    json!({"consistencyInfo": {"type": "eventual"}})
}

/// Reduce a delete body to what the engine needs to find the stack.
pub fn format_delete_request(body: &Value) -> Value {
    let field = |name: &str| body.get(name).filter(|v| !v.is_null()).cloned();

    let mut request = Map::new();
    request.insert(
        "datacenter".to_string(),
        json!({"id": field("region_id").unwrap_or(Value::Null)}),
    );
    request.insert(
        "stack_name".to_string(),
        field("stack_name")
            .or_else(|| field("vf_module_name"))
            .unwrap_or(Value::Null),
    );
    if let Some(tenant_id) = field("tenant_id") {
        request.insert("tenant_id".to_string(), tenant_id);
    }
    Value::Object(request)
}
