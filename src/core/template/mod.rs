//! `${...}` template resolution.
//!
//! Paths such as `fetch.response.items[0].name` are resolved against a
//! mapping of root identifiers to JSON values. Strings crossed in the middle
//! of a path are treated as JSON text. Resolution never fails: unresolvable
//! paths produce `None`, and unresolvable markers are left in place so the
//! caller can decide whether that is fatal.

pub mod json;
pub mod resolver;
pub mod syntax;

pub use json::{diagnose_malformed_json, looks_like_json, parse_lenient, JsonDiagnosis};
pub use resolver::{
    has_templates, interpolate, resolution_context, resolve_nested, resolve_string,
    resolve_value, stringify, template_sites, variable_exists, Context, TemplateSite,
};
pub use syntax::{
    contains_template, marker_mismatch, parse_path, simple_template_path,
    split_root, template_paths, PathError, PathSegment,
};
