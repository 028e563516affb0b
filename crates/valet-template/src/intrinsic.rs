//! Intrinsic function evaluation: `get_param`, `get_attr`, `get_resource`
//! and `str_replace`.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::ResolutionContext;
use crate::property::{Intrinsic, ParamIndex, ParamRef, Property};

/// Whether a group cursor, when set, post-processes `get_param` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// A sequence result is indexed by the cursor instead of the supplied
    /// index; a scalar result is returned as-is.
    Apply,
    Ignore,
}

impl ResolutionContext<'_> {
    /// Evaluate an intrinsic against the current template's `resources`,
    /// with `parent` as the injected-property scope.
    pub fn evaluate(
        &self,
        intrinsic: &Intrinsic<'_>,
        resources: &Map<String, Value>,
        parent: Option<&Map<String, Value>>,
        mode: CursorMode,
    ) -> Option<Value> {
        match intrinsic {
            Intrinsic::GetParam(param) => self.get_param(param, parent, mode),
            Intrinsic::GetAttr(path) => self.get_attr(path),
            Intrinsic::GetResource(name) => resources.get(*name).cloned(),
            Intrinsic::StrReplace(body) => self.str_replace(body, parent, mode),
            Intrinsic::Malformed(function) => {
                warn!(function, "malformed intrinsic argument");
                None
            }
        }
    }

    pub fn get_param(
        &self,
        param: &ParamRef<'_>,
        parent: Option<&Map<String, Value>>,
        mode: CursorMode,
    ) -> Option<Value> {
        match (mode, self.cursor) {
            (CursorMode::Apply, Some(cursor)) => {
                match self.param_plain(param.name, parent)? {
                    Value::Array(items) => items.get(cursor).cloned(),
                    other => Some(other),
                }
            }
            _ => {
                let index = self.param_index(&param.index, parent);
                self.param(param.name, parent, param.name, index)
            }
        }
    }

    /// Numeric value of the second `get_param` element. `{get_param: index}`
    /// is the current group cursor.
    pub(crate) fn param_index(
        &self,
        index: &ParamIndex<'_>,
        parent: Option<&Map<String, Value>>,
    ) -> Option<usize> {
        match index {
            ParamIndex::None => None,
            ParamIndex::Literal(i) => Some(*i),
            ParamIndex::Reference(map) => match Intrinsic::parse(map) {
                Some(Intrinsic::GetParam(ParamRef { name: "index", .. })) => self.cursor,
                Some(Intrinsic::GetParam(inner)) => {
                    self.param_plain(inner.name, parent).and_then(|v| as_index(&v))
                }
                _ => None,
            },
            ParamIndex::Invalid(value) => {
                warn!(%value, "get_param index is not an integer");
                None
            }
        }
    }

    /// `[resource, attribute]` → `[found_resource, attribute]` from the
    /// innermost stack frame that knows the resource.
    pub fn get_attr(&self, path: &[Value]) -> Option<Value> {
        let (name, attribute) = match (path.first().and_then(Value::as_str), path.get(1)) {
            (Some(name), Some(attribute)) => (name, attribute),
            _ => {
                warn!(?path, "get_attr needs a resource name and an attribute");
                return None;
            }
        };
        let found = self.stack.find(name);
        if found.is_none() {
            debug!(resource = name, "get_attr target not on resource stack");
        }
        found.map(|resource| Value::Array(vec![resource.clone(), attribute.clone()]))
    }

    /// Only the first `params` entry is used.
    pub fn str_replace(
        &self,
        body: &Map<String, Value>,
        parent: Option<&Map<String, Value>>,
        mode: CursorMode,
    ) -> Option<Value> {
        let (_, first) = body.get("params")?.as_object()?.iter().next()?;
        match Property::classify(first) {
            Property::Reference(Intrinsic::GetParam(param)) => self.get_param(&param, parent, mode),
            Property::Null => None,
            _ => Some(first.clone()),
        }
    }
}

/// Integer view of a resolved value (number or numeric string).
pub fn as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
