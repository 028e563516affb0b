//! Envelope validation.

use serde_json::Value;
use valet_core::{PlacementEnvelope, REQUIRED_FIELDS};

/// Required fields that are absent, null or empty strings, in declaration
/// order. Any other value counts as present.
pub fn missing_fields(envelope: &PlacementEnvelope) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|name| is_blank(envelope.field(name)))
        .collect()
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Body text reported for a validation failure.
pub fn required_fields_message(missing: &[&str]) -> String {
    format!("RequiredFields : [{}]", missing.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PlacementEnvelope {
        PlacementEnvelope {
            region_id: Some("dc1".into()),
            keystone_url: Some("http://keystone:5000/v3".into()),
            tenant_id: Some("t1".into()),
            service_instance_id: Some("si1".into()),
            vnf_id: Some("vnf1".into()),
            vnf_name: Some("vnf-one".into()),
            vf_module_id: Some("vfm1".into()),
            vf_module_name: Some("vfm-one".into()),
            ..PlacementEnvelope::default()
        }
    }

    #[test]
    fn complete_envelope_passes() {
        assert!(missing_fields(&complete()).is_empty());
    }

    #[test]
    fn reports_every_missing_or_empty_field() {
        let mut envelope = complete();
        envelope.tenant_id = None;
        envelope.vnf_name = Some("".into());
        assert_eq!(missing_fields(&envelope), ["tenant_id", "vnf_name"]);
        assert_eq!(
            required_fields_message(&missing_fields(&envelope)),
            "RequiredFields : [tenant_id, vnf_name]"
        );
    }

    #[test]
    fn non_string_values_are_present() {
        let mut envelope = complete();
        envelope.tenant_id = Some(42.into());
        envelope.vf_module_id = Some(serde_json::json!({"id": "vfm1"}));
        assert!(missing_fields(&envelope).is_empty());
    }

    #[test]
    fn empty_envelope_misses_all() {
        assert_eq!(missing_fields(&PlacementEnvelope::default()).len(), 8);
    }
}
