//! Shape classification of template property values.
//!
//! Every property value falls into exactly one [`Property`] variant, so the
//! engine dispatches with a `match` instead of probing the JSON by hand.

use serde_json::{Map, Value};

/// Intrinsic function names, in lookup priority order.
pub const GET_PARAM: &str = "get_param";
pub const GET_ATTR: &str = "get_attr";
pub const GET_RESOURCE: &str = "get_resource";
pub const STR_REPLACE: &str = "str_replace";

/// A property value, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Property<'a> {
    Null,
    /// String, number or boolean.
    Scalar(&'a Value),
    Sequence(&'a [Value]),
    Reference(Intrinsic<'a>),
    NestedMap(&'a Map<String, Value>),
}

impl<'a> Property<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Null => Property::Null,
            Value::Bool(_) | Value::Number(_) | Value::String(_) => Property::Scalar(value),
            Value::Array(items) => Property::Sequence(items),
            Value::Object(map) => match Intrinsic::parse(map) {
                Some(intrinsic) => Property::Reference(intrinsic),
                None => Property::NestedMap(map),
            },
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Property::Reference(_))
    }
}

/// An intrinsic function invocation found in a template.
#[derive(Debug, Clone, PartialEq)]
pub enum Intrinsic<'a> {
    GetParam(ParamRef<'a>),
    /// `[resource_name, attribute_name, ...]`
    GetAttr(&'a [Value]),
    GetResource(&'a str),
    /// The `str_replace` body (`template`, `params`).
    StrReplace(&'a Map<String, Value>),
    /// A recognized function whose argument has the wrong shape.
    Malformed(&'static str),
}

impl<'a> Intrinsic<'a> {
    /// Recognize an intrinsic call; `None` when the map is plain data.
    pub fn parse(map: &'a Map<String, Value>) -> Option<Self> {
        if let Some(arg) = map.get(GET_PARAM) {
            return Some(match ParamRef::parse(arg) {
                Some(param) => Intrinsic::GetParam(param),
                None => Intrinsic::Malformed(GET_PARAM),
            });
        }
        if let Some(arg) = map.get(GET_ATTR) {
            return Some(match arg {
                Value::Array(path) => Intrinsic::GetAttr(path),
                _ => Intrinsic::Malformed(GET_ATTR),
            });
        }
        if let Some(arg) = map.get(GET_RESOURCE) {
            return Some(match arg {
                Value::String(name) => Intrinsic::GetResource(name),
                _ => Intrinsic::Malformed(GET_RESOURCE),
            });
        }
        if let Some(arg) = map.get(STR_REPLACE) {
            return Some(match arg {
                Value::Object(body) => Intrinsic::StrReplace(body),
                _ => Intrinsic::Malformed(STR_REPLACE),
            });
        }
        None
    }
}

/// Argument of a `get_param`: a name and an optional index.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRef<'a> {
    pub name: &'a str,
    pub index: ParamIndex<'a>,
}

/// The second element of the list form `get_param: [name, index]`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamIndex<'a> {
    None,
    Literal(usize),
    /// A nested reference, e.g. `{get_param: index}`.
    Reference(&'a Map<String, Value>),
    /// Present but neither an integer nor a reference.
    Invalid(&'a Value),
}

impl<'a> ParamRef<'a> {
    fn parse(arg: &'a Value) -> Option<Self> {
        match arg {
            Value::String(name) => Some(ParamRef {
                name,
                index: ParamIndex::None,
            }),
            Value::Array(items) => {
                let name = items.first()?.as_str()?;
                let index = match items.get(1) {
                    None => ParamIndex::None,
                    Some(Value::Number(n)) => match n.as_u64() {
                        Some(i) => ParamIndex::Literal(i as usize),
                        None => ParamIndex::Invalid(&items[1]),
                    },
                    Some(Value::String(s)) => match s.parse::<usize>() {
                        Ok(i) => ParamIndex::Literal(i),
                        Err(_) => ParamIndex::Invalid(&items[1]),
                    },
                    Some(Value::Object(map)) => ParamIndex::Reference(map),
                    Some(other) => ParamIndex::Invalid(other),
                };
                Some(ParamRef { name, index })
            }
            _ => None,
        }
    }
}

/// Whether `value` is exactly `{get_param: key}` (a property pointing at
/// its own name).
pub fn is_self_reference(value: &Value, key: &str) -> bool {
    value
        .as_object()
        .and_then(|map| map.get(GET_PARAM))
        .and_then(Value::as_str)
        .is_some_and(|name| name == key)
}

/// The parameter name of a plain `{get_param: name}` reference.
pub fn param_name(value: &Value) -> Option<&str> {
    match Property::classify(value) {
        Property::Reference(Intrinsic::GetParam(ParamRef { name, .. })) => Some(name),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_shapes() {
        assert_eq!(Property::classify(&Value::Null), Property::Null);
        assert!(matches!(
            Property::classify(&json!("x")),
            Property::Scalar(_)
        ));
        assert!(matches!(
            Property::classify(&json!([1, 2])),
            Property::Sequence(items) if items.len() == 2
        ));
        assert!(matches!(
            Property::classify(&json!({"a": 1})),
            Property::NestedMap(_)
        ));
    }

    #[test]
    fn get_param_forms() {
        let direct = json!({"get_param": "vm_name"});
        assert_eq!(
            Property::classify(&direct),
            Property::Reference(Intrinsic::GetParam(ParamRef {
                name: "vm_name",
                index: ParamIndex::None
            }))
        );

        let indexed = json!({"get_param": ["names", 2]});
        assert!(matches!(
            Property::classify(&indexed),
            Property::Reference(Intrinsic::GetParam(ParamRef {
                name: "names",
                index: ParamIndex::Literal(2)
            }))
        ));

        let cursor = json!({"get_param": ["hosts", {"get_param": "index"}]});
        assert!(matches!(
            Property::classify(&cursor),
            Property::Reference(Intrinsic::GetParam(ParamRef {
                index: ParamIndex::Reference(_),
                ..
            }))
        ));
    }

    #[test]
    fn malformed_reference() {
        let bad = json!({"get_param": 7});
        assert_eq!(
            Property::classify(&bad),
            Property::Reference(Intrinsic::Malformed(GET_PARAM))
        );
        let bad_attr = json!({"get_attr": "server"});
        assert_eq!(
            Property::classify(&bad_attr),
            Property::Reference(Intrinsic::Malformed(GET_ATTR))
        );
    }

    #[test]
    fn self_reference_detection() {
        assert!(is_self_reference(&json!({"get_param": "flavor"}), "flavor"));
        assert!(!is_self_reference(&json!({"get_param": "image"}), "flavor"));
        assert!(!is_self_reference(&json!("flavor"), "flavor"));
        assert_eq!(param_name(&json!({"get_param": "image"})), Some("image"));
    }
}
