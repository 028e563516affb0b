//! Template resolution engine.
//!
//! Walks a template's `resources`, injects the enclosing resource's
//! properties into nested templates, expands resource groups into numbered
//! replicas and resolves the handful of properties the placement engine
//! consumes.

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use valet_core::HeatRequest;

use crate::context::ResolutionContext;
use crate::error::{TemplateError, TemplateResult};
use crate::heat::*;
use crate::intrinsic::{CursorMode, as_index};
use crate::property::{Intrinsic, ParamIndex, ParamRef, Property, is_self_reference, param_name};
use crate::yaml;

/// Resolve a Heat request into its flat map of server resources.
pub fn resolve_heat_request(heat: &HeatRequest) -> TemplateResult<Map<String, Value>> {
    let template = yaml::normalize(&heat.template, "template")?;
    let environment = yaml::normalize(&heat.environment, "environment")?;
    let env_params = environment
        .get("parameters")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut ctx = ResolutionContext::new(&heat.files, &env_params, &heat.parameters);
    let resolved = ctx.process_template(&template, None)?;
    info!(
        stack = heat.stack_name.as_deref().unwrap_or_default(),
        resources = resolved.len(),
        "template resolved"
    );
    Ok(resolved)
}

impl ResolutionContext<'_> {
    /// Resolve every interpreted resource of `template`. `parent` holds the
    /// properties injected by the enclosing resource, if any.
    pub fn process_template(
        &mut self,
        template: &Value,
        parent: Option<&Map<String, Value>>,
    ) -> TemplateResult<Map<String, Value>> {
        let resources = template
            .get(RESOURCES)
            .and_then(Value::as_object)
            .ok_or(TemplateError::MissingResources)?;
        self.descend(|ctx| {
            ctx.with_frame(resources.clone(), |ctx| ctx.process_resources(resources, parent))
        })
    }

    fn process_resources(
        &mut self,
        resources: &Map<String, Value>,
        parent: Option<&Map<String, Value>>,
    ) -> TemplateResult<Map<String, Value>> {
        let mut resolved = Map::new();
        for (name, resource) in resources {
            let Some(resource) = resource.as_object() else {
                continue;
            };
            let Some(kind) = resource
                .get(TYPE)
                .and_then(Value::as_str)
                .and_then(ResourceKind::from_type)
            else {
                debug!(resource = %name, "skipping uninterpreted resource");
                continue;
            };
            // Server groups only matter once a server references them.
            if kind == ResourceKind::ServerGroup && parent.is_none() {
                continue;
            }

            let mut properties = resource
                .get(PROPERTIES)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            if let Some(parent) = parent {
                merge_parent_properties(&mut properties, parent);
            }
            let mut resource = resource.clone();
            resource.insert(PROPERTIES.to_string(), Value::Object(properties.clone()));

            let output = self.parse_resource_object(resources, resource, &properties)?;
            rehome(name, output, &mut resolved);
        }
        Ok(resolved)
    }

    /// Resolve one resource object. Returns the resource with resolved
    /// properties, a map of replicas for a group, or the parsed nested
    /// template for a `*.yaml` type.
    pub fn parse_resource_object(
        &mut self,
        resources: &Map<String, Value>,
        resource: Map<String, Value>,
        scope: &Map<String, Value>,
    ) -> TemplateResult<Value> {
        self.descend(move |ctx| {
            let kind = resource
                .get(TYPE)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let properties = resource.get(PROPERTIES).and_then(Value::as_object);

            let is_group = ResourceKind::from_type(&kind).is_some_and(|k| k.is_group());
            if let Some(properties) = properties.filter(|p| is_group && p.contains_key(RESOURCE_DEF)) {
                return ctx.expand_group(resources, properties, scope);
            }
            if is_nested_template(&kind) {
                return Ok(ctx.nested_template(&kind)?.unwrap_or(Value::Null));
            }
            let Some(properties) = properties else {
                return Ok(Value::Object(resource));
            };

            let resolved = ctx.resolve_properties(resources, properties, scope)?;
            let mut resource = resource;
            resource.insert(PROPERTIES.to_string(), Value::Object(resolved));
            Ok(Value::Object(resource))
        })
    }

    /// Evaluate references in a `resource_def.properties` block. Group
    /// cursors are not applied here; the nested template applies them.
    pub fn process_properties(
        &self,
        properties: &Map<String, Value>,
        parent: Option<&Map<String, Value>>,
        resources: &Map<String, Value>,
    ) -> Map<String, Value> {
        properties
            .iter()
            .map(|(key, value)| {
                let output = match Property::classify(value) {
                    Property::Reference(intrinsic) => self
                        .evaluate(&intrinsic, resources, parent, CursorMode::Ignore)
                        .unwrap_or(Value::Null),
                    _ => value.clone(),
                };
                (key.clone(), output)
            })
            .collect()
    }

    fn expand_group(
        &mut self,
        resources: &Map<String, Value>,
        properties: &Map<String, Value>,
        scope: &Map<String, Value>,
    ) -> TemplateResult<Value> {
        let mut replicas = Map::new();
        let Some(definition) = properties.get(RESOURCE_DEF).and_then(Value::as_object) else {
            return Ok(Value::Object(replicas));
        };
        let Some(nested_name) = definition
            .get(TYPE)
            .and_then(Value::as_str)
            .filter(|t| is_nested_template(t))
        else {
            debug!("group resource_def is not a nested template");
            return Ok(Value::Object(replicas));
        };

        let count = self.group_count(properties.get(COUNT), scope)?;
        let Some(nested) = self.nested_template(nested_name)? else {
            warn!(template = nested_name, "nested template missing from files");
            return Ok(Value::Object(replicas));
        };
        let definition_properties = definition
            .get(PROPERTIES)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        debug!(template = nested_name, count, "expanding resource group");

        for cursor in 0..count {
            let replica = self.with_cursor(cursor, |ctx| -> TemplateResult<Option<(String, Value)>> {
                let injected = ctx.process_properties(&definition_properties, Some(scope), resources);
                let resolved = ctx.process_template(&nested, Some(&injected))?;
                let Some((name, Value::Object(mut resource))) = resolved.into_iter().next() else {
                    warn!(template = nested_name, cursor, "nested template produced no server");
                    return Ok(None);
                };
                let kept = replica_properties(resource.get(PROPERTIES));
                resource.insert(PROPERTIES.to_string(), Value::Object(kept));
                Ok(Some((format!("{name}_{cursor}"), Value::Object(resource))))
            })?;
            if let Some((key, resource)) = replica {
                replicas.insert(key, resource);
            }
        }
        Ok(Value::Object(replicas))
    }

    /// Replica count of a group: literal, numeric string or `get_param`.
    /// Absent or unresolved means one replica.
    fn group_count(&self, count: Option<&Value>, scope: &Map<String, Value>) -> TemplateResult<usize> {
        let Some(count) = count.filter(|c| !c.is_null()) else {
            return Ok(1);
        };
        if let Some(name) = param_name(count) {
            return match self.param_plain(name, Some(scope)) {
                None | Some(Value::Null) => Ok(1),
                Some(resolved) => {
                    as_index(&resolved).ok_or_else(|| TemplateError::InvalidCount(resolved.to_string()))
                }
            };
        }
        as_index(count).ok_or_else(|| TemplateError::InvalidCount(count.to_string()))
    }

    fn nested_template(&self, name: &str) -> TemplateResult<Option<Value>> {
        match self.files.get(name) {
            Some(document) if !document.is_null() => yaml::normalize(document, name).map(Some),
            _ => Ok(None),
        }
    }

    fn resolve_properties(
        &mut self,
        resources: &Map<String, Value>,
        properties: &Map<String, Value>,
        scope: &Map<String, Value>,
    ) -> TemplateResult<Map<String, Value>> {
        let mut resolved = Map::new();
        for (key, value) in properties {
            let output = match key.as_str() {
                NETWORKS => continue,
                COUNT => Some(self.count_property(value)?),
                RESOURCE_DEF => Some(self.resolve_resource_def(resources, value, scope)?),
                AVAILABILITY_ZONE => Some(self.resolve_availability_zone(resources, value, scope)?),
                SCHEDULER_HINTS => Some(self.resolve_scheduler_hints(resources, value, scope)?),
                METADATA => Some(self.resolve_metadata(value, scope)?),
                _ => self.resolve_value(resources, value, scope),
            };
            if let Some(output) = output {
                resolved.insert(key.clone(), output);
            }
        }
        Ok(resolved)
    }

    fn count_property(&self, value: &Value) -> TemplateResult<Value> {
        let resolved = match param_name(value) {
            Some(name) => self.param_plain(name, None),
            None => Some(value.clone()),
        };
        resolved
            .as_ref()
            .and_then(as_index)
            .map(Value::from)
            .ok_or_else(|| TemplateError::InvalidCount(value.to_string()))
    }

    /// Resolve the nested template of a `resource_def` and attach it back
    /// in place of its `type`.
    fn resolve_resource_def(
        &mut self,
        resources: &Map<String, Value>,
        value: &Value,
        scope: &Map<String, Value>,
    ) -> TemplateResult<Value> {
        let Some(definition) = value.as_object() else {
            return Ok(value.clone());
        };
        let definition_properties = definition
            .get(PROPERTIES)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let injected = self.process_properties(&definition_properties, Some(scope), resources);

        let nested_name = definition.get(TYPE).and_then(Value::as_str);
        let nested = match nested_name {
            Some(name) => match self.nested_template(name)? {
                Some(template) => Value::Object(self.process_template(&template, Some(&injected))?),
                None => Value::Null,
            },
            None => Value::Null,
        };

        let mut definition = definition.clone();
        definition.insert(TYPE.to_string(), nested);
        definition.insert(PROPERTIES.to_string(), Value::Object(injected));
        Ok(Value::Object(definition))
    }

    /// `availability_zone`: a `get_param` defaulting to `"None"`, or a
    /// `str_replace` of `$AZ` and `$VALET_HOST_ASSIGNMENT` producing
    /// `[zone, host_assignment, index?]`.
    pub(crate) fn resolve_availability_zone(
        &mut self,
        resources: &Map<String, Value>,
        value: &Value,
        scope: &Map<String, Value>,
    ) -> TemplateResult<Value> {
        match Property::classify(value) {
            Property::Reference(Intrinsic::GetParam(param)) => {
                let index = self.param_index(&param.index, Some(scope));
                Ok(self
                    .param(param.name, Some(scope), AZ_MARKER, index)
                    .unwrap_or(Value::Null))
            }
            Property::Reference(Intrinsic::StrReplace(body)) => {
                self.host_assignment(resources, body, scope)
            }
            _ => Ok(value.clone()),
        }
    }

    fn host_assignment(
        &mut self,
        resources: &Map<String, Value>,
        body: &Map<String, Value>,
        scope: &Map<String, Value>,
    ) -> TemplateResult<Value> {
        let params = body.get("params").and_then(Value::as_object);

        let zone = match params.and_then(|p| p.get(AZ_MARKER)).map(Property::classify) {
            Some(Property::Reference(Intrinsic::GetParam(ParamRef {
                name,
                index: ParamIndex::None,
            }))) => self.param(name, Some(scope), AZ_MARKER, None),
            Some(Property::Reference(Intrinsic::GetParam(param))) => {
                let index = self.param_index(&param.index, Some(scope));
                let resolved = self.param(param.name, Some(scope), AZ_MARKER, index);
                self.zone_from_outputs(resources, resolved, scope)?
            }
            _ => None,
        };

        let (host, host_index) = match params
            .and_then(|p| p.get(HOST_ASSIGNMENT_MARKER))
            .map(Property::classify)
        {
            Some(Property::Reference(Intrinsic::GetParam(param))) => {
                let index = self.param_index(&param.index, Some(scope));
                (
                    self.param(param.name, Some(scope), HOST_ASSIGNMENT_MARKER, index),
                    index,
                )
            }
            _ => (None, None),
        };

        let mut assignment = vec![zone.unwrap_or(Value::Null), host.unwrap_or(Value::Null)];
        if let Some(index) = host_index {
            assignment.push(Value::from(index));
        }
        Ok(Value::Array(assignment))
    }

    /// Follow a `[resource, output_name]` pair (as produced by `get_attr`)
    /// into the resource's nested template and pick the cursor's entry of
    /// that output. Any other value is returned unchanged.
    fn zone_from_outputs(
        &mut self,
        resources: &Map<String, Value>,
        resolved: Option<Value>,
        scope: &Map<String, Value>,
    ) -> TemplateResult<Option<Value>> {
        let target = match resolved.as_ref() {
            Some(Value::Array(pair)) => match (pair.first(), pair.get(1).and_then(Value::as_str)) {
                (Some(Value::Object(target)), Some(output)) => {
                    Some((target.clone(), output.to_string()))
                }
                _ => None,
            },
            _ => None,
        };
        let Some((target, output)) = target else {
            return Ok(resolved);
        };
        let Some(cursor) = self.cursor() else {
            debug!(output = %output, "zone output lookup outside a group");
            return Ok(None);
        };

        let nested = self.parse_resource_object(resources, target, scope)?;
        let Some(entry) = nested
            .get("outputs")
            .and_then(|outputs| outputs.get(output.as_str()))
            .and_then(|o| o.get("value"))
            .and_then(Value::as_array)
            .and_then(|values| values.get(cursor))
            .cloned()
        else {
            return Ok(None);
        };

        if let Some(name) = param_name(&entry) {
            return Ok(self.param(name, None, AZ_MARKER, None));
        }
        Ok(Some(match entry {
            Value::String(_) => entry,
            other => Value::String(other.to_string()),
        }))
    }

    /// `scheduler_hints.group` becomes `{group: {name: resolved_group}}`
    /// for references, `{group: literal}` otherwise.
    fn resolve_scheduler_hints(
        &mut self,
        resources: &Map<String, Value>,
        value: &Value,
        scope: &Map<String, Value>,
    ) -> TemplateResult<Value> {
        let Some(group) = value.as_object().and_then(|hints| hints.get("group")) else {
            return Ok(value.clone());
        };

        let hints = match Property::classify(group) {
            Property::Reference(Intrinsic::GetResource(name)) => {
                let target = match resources.get(name).and_then(Value::as_object) {
                    Some(target) => self.parse_resource_object(resources, target.clone(), scope)?,
                    None => Value::Null,
                };
                single("group", single(name, target))
            }
            Property::Reference(Intrinsic::GetParam(param)) => {
                let found = self.stack.find(param.name).and_then(Value::as_object).cloned();
                let target = match found {
                    Some(target) => self.parse_resource_object(resources, target, scope)?,
                    None => self
                        .param_plain(param.name, Some(scope))
                        .unwrap_or(Value::Null),
                };
                single("group", single(param.name, target))
            }
            _ => single("group", group.clone()),
        };
        Ok(hints)
    }

    /// `metadata` keeps only `valet_groups`. A literal string is kept apart
    /// from quoted separators; lists and references are flattened to
    /// `"a, b"`.
    fn resolve_metadata(&self, value: &Value, scope: &Map<String, Value>) -> TemplateResult<Value> {
        let Some(metadata) = value.as_object() else {
            return Ok(value.clone());
        };
        let mut kept = Map::new();
        if let Some(groups) = metadata.get(VALET_GROUPS) {
            let text = match groups {
                Value::String(s) => unquote_separators(s)?,
                Value::Array(items) => normalize_valet_groups(
                    &items
                        .iter()
                        .map(|item| self.valet_group_text(item, scope))
                        .collect::<Vec<_>>()
                        .join(","),
                )?,
                other => normalize_valet_groups(&self.valet_group_text(other, scope))?,
            };
            kept.insert(VALET_GROUPS.to_string(), Value::String(text));
        }
        Ok(Value::Object(kept))
    }

    fn valet_group_text(&self, item: &Value, scope: &Map<String, Value>) -> String {
        let Some(name) = param_name(item) else {
            return value_text(item);
        };
        match self.param_plain(name, Some(scope)) {
            Some(Value::Array(items)) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
            Some(resolved) => value_text(&resolved),
            None => String::new(),
        }
    }

    /// Any other property: scalars and plain maps are copied, references
    /// evaluated (cursor-aware), sequences led by a reference resolved
    /// element-wise. Nulls are dropped.
    fn resolve_value(
        &self,
        resources: &Map<String, Value>,
        value: &Value,
        scope: &Map<String, Value>,
    ) -> Option<Value> {
        let eval = |intrinsic: &Intrinsic<'_>| {
            self.evaluate(intrinsic, resources, Some(scope), CursorMode::Apply)
                .unwrap_or(Value::Null)
        };
        match Property::classify(value) {
            Property::Null => None,
            Property::Scalar(_) | Property::NestedMap(_) => Some(value.clone()),
            Property::Reference(intrinsic) => Some(eval(&intrinsic)),
            Property::Sequence(items) => {
                let led_by_reference = items
                    .first()
                    .is_some_and(|first| Property::classify(first).is_reference());
                if !led_by_reference {
                    return Some(value.clone());
                }
                let resolved = items
                    .iter()
                    .map(|item| match Property::classify(item) {
                        Property::Reference(intrinsic) => eval(&intrinsic),
                        _ => item.clone(),
                    })
                    .collect();
                Some(Value::Array(resolved))
            }
        }
    }
}

/// Inject the enclosing resource's properties: add the ones the nested
/// resource lacks and replace the ones that only point back at themselves.
fn merge_parent_properties(properties: &mut Map<String, Value>, parent: &Map<String, Value>) {
    for (key, value) in parent {
        let replace = match properties.get(key) {
            None => true,
            Some(own) => is_self_reference(own, key),
        };
        if replace {
            properties.insert(key.clone(), value.clone());
        }
    }
}

/// Place a resolved resource in the result: an interpreted resource keeps
/// its name, otherwise its interpreted entries (group replicas) are hoisted.
fn rehome(name: &str, output: Value, resolved: &mut Map<String, Value>) {
    let Value::Object(output) = output else {
        return;
    };
    if is_interpreted(&output) {
        resolved.insert(name.to_string(), Value::Object(output));
        return;
    }
    for (key, entry) in output {
        let Value::Object(entry) = entry else {
            break;
        };
        if is_interpreted(&entry) {
            resolved.insert(key, Value::Object(entry));
        }
    }
}

fn is_interpreted(resource: &Map<String, Value>) -> bool {
    resource
        .get(TYPE)
        .and_then(Value::as_str)
        .and_then(ResourceKind::from_type)
        .is_some()
}

fn replica_properties(properties: Option<&Value>) -> Map<String, Value> {
    let Some(properties) = properties.and_then(Value::as_object) else {
        return Map::new();
    };
    properties
        .iter()
        .filter(|(key, _)| REPLICA_PROPERTIES.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Collapse `"a" , "b"` style separators to `, `.
fn unquote_separators(raw: &str) -> TemplateResult<String> {
    let separator = Regex::new(r#""\s?,\s?""#)?;
    Ok(separator.replace_all(raw, ", ").into_owned())
}

/// Split on commas, drop quoting and list brackets, rejoin as `"a, b"`.
fn normalize_valet_groups(raw: &str) -> TemplateResult<String> {
    let separator = Regex::new(r#"\s*,\s*"#)?;
    let groups: Vec<&str> = separator
        .split(raw)
        .map(|group| group.trim().trim_matches(['"', '[', ']']).trim())
        .filter(|group| !group.is_empty())
        .collect();
    Ok(groups.join(", "))
}
