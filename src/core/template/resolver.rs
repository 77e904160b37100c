use super::json::{looks_like_json, parse_lenient};
use super::syntax::{contains_template, markers, parse_path, simple_template_path, PathSegment, MARKER_OPEN};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Values visible to template resolution, keyed by root identifier.
pub type Context = Map<String, Value>;

/// Resolve a dotted/bracketed path against `context`.
///
/// `None` means the path does not resolve. A string met in the middle of a
/// path is parsed as JSON before the next segment applies; a string at the
/// end of the path is returned as-is.
pub fn resolve_value(path: &str, context: &Context) -> Option<Value> {
    let segments = parse_path(path).ok()?;
    let (root, rest) = segments.split_first()?;
    let PathSegment::Field(root) = root else {
        return None;
    };

    let mut current = Cow::Borrowed(context.get(root)?);
    for segment in rest {
        current = descend(current, segment)?;
    }
    Some(current.into_owned())
}

fn descend<'a>(current: Cow<'a, Value>, segment: &PathSegment) -> Option<Cow<'a, Value>> {
    if let Value::String(text) = current.as_ref() {
        let parsed: Value = serde_json::from_str(text).ok()?;
        return lookup(&parsed, segment).cloned().map(Cow::Owned);
    }
    match current {
        Cow::Borrowed(value) => lookup(value, segment).map(Cow::Borrowed),
        Cow::Owned(value) => lookup(&value, segment).cloned().map(Cow::Owned),
    }
}

fn lookup<'v>(value: &'v Value, segment: &PathSegment) -> Option<&'v Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Field(name)) => map.get(name),
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        _ => None,
    }
}

/// True exactly when [`resolve_value`] returns `Some` for the same inputs.
pub fn variable_exists(path: &str, context: &Context) -> bool {
    resolve_value(path, context).is_some()
}

/// Text form of a value interpolated into surrounding text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Resolve every marker in `template`.
///
/// A simple template yields the resolved value with its own type; anything
/// else yields a string. Unresolvable markers stay in the output verbatim.
pub fn resolve_string(template: &str, context: &Context) -> Value {
    if let Some(path) = simple_template_path(template) {
        return resolve_value(path, context).unwrap_or_else(|| Value::String(template.to_string()));
    }
    Value::String(interpolate(template, context))
}

/// Substitute every resolvable marker as text.
pub fn interpolate(template: &str, context: &Context) -> String {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for (whole, path) in markers(template) {
        out.push_str(&template[last..whole.start()]);
        match resolve_value(path, context) {
            Some(value) => out.push_str(&stringify(&value)),
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    out
}

/// Resolve templates anywhere inside `value`.
///
/// Strings held directly by an object or array are inline positions: when
/// such a string is a simple template whose value is JSON text, the parsed
/// structure replaces it. Invalid JSON keeps the string.
pub fn resolve_nested(value: &Value, context: &Context) -> Value {
    match value {
        Value::String(text) => resolve_string(text, context),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, child)| (key.clone(), resolve_inline(child, context)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|child| resolve_inline(child, context)).collect())
        }
        other => other.clone(),
    }
}

fn resolve_inline(value: &Value, context: &Context) -> Value {
    match value {
        Value::String(text) if simple_template_path(text).is_some() => {
            auto_parse(resolve_string(text, context))
        }
        other => resolve_nested(other, context),
    }
}

fn auto_parse(value: Value) -> Value {
    match value {
        Value::String(text) if looks_like_json(&text) => {
            parse_lenient(&text).unwrap_or(Value::String(text))
        }
        other => other,
    }
}

/// Whether any string reachable from `value` contains a valid marker.
pub fn has_templates(value: &Value) -> bool {
    match value {
        Value::String(text) => contains_template(text),
        Value::Array(items) => items.iter().any(has_templates),
        Value::Object(map) => map.values().any(has_templates),
        _ => false,
    }
}

/// A string inside a parameter structure that opens at least one marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSite<'a> {
    /// Top-level parameter key.
    pub param: &'a str,
    /// Location within the parameter, e.g. `headers.Authorization` or `items[0]`.
    pub path: String,
    pub text: &'a str,
    /// The string is the parameter value itself rather than nested inside it.
    pub top_level: bool,
}

/// Every string in `params` containing a marker opening, valid or not.
pub fn template_sites(params: &Map<String, Value>) -> Vec<TemplateSite<'_>> {
    let mut sites = Vec::new();
    for (key, value) in params {
        collect_sites(key, value, key.clone(), true, &mut sites);
    }
    sites
}

fn collect_sites<'a>(
    param: &'a str,
    value: &'a Value,
    path: String,
    top_level: bool,
    sites: &mut Vec<TemplateSite<'a>>,
) {
    match value {
        Value::String(text) if text.contains(MARKER_OPEN) => sites.push(TemplateSite {
            param,
            path,
            text,
            top_level,
        }),
        Value::Object(map) => {
            for (key, child) in map {
                collect_sites(param, child, format!("{}.{}", path, key), false, sites);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_sites(param, child, format!("{}[{}]", path, index), false, sites);
            }
        }
        _ => {}
    }
}

/// Shared-store data overlaid with the initial parameters, which win on conflict.
pub fn resolution_context(shared: &Map<String, Value>, initial: &Map<String, Value>) -> Context {
    let mut context = shared.clone();
    for (key, value) in initial {
        context.insert(key.clone(), value.clone());
    }
    context
}
