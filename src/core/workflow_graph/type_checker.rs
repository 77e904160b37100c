//! Static typing of template paths against declared node interfaces.
//!
//! Type strings are the registry's vocabulary: `str`, `int`, `float`, `bool`,
//! `dict`, `list`, `any`, and unions written `dict|str`.

use crate::core::template::{parse_path, PathSegment};
use indexmap::IndexMap;
use pflow_types::{Registry, StructureField, WorkflowIr};

pub const ANY: &str = "any";

/// Declared shape of one node output, as seen by template paths.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputShape {
    pub node_id: String,
    pub output_type: String,
    pub structure: IndexMap<String, StructureField>,
    /// Every node declaring this key, in IR order. Only flat mode has more than one.
    pub producers: Vec<String>,
}

/// Output shapes keyed `node_id.output_key` (namespaced) or `output_key` (flat).
pub type NodeOutputs = IndexMap<String, OutputShape>;

/// Collect the declared outputs of every node in `ir`.
///
/// In flat mode a later node's declared shape replaces an earlier one with the
/// same key, while `producers` keeps every node that writes it.
pub fn build_node_outputs(ir: &WorkflowIr, registry: &Registry) -> NodeOutputs {
    let mut outputs = NodeOutputs::new();
    for node in &ir.nodes {
        let Some(metadata) = registry.get(&node.node_type) else {
            continue;
        };
        for output in &metadata.outputs {
            let key = if ir.enable_namespacing {
                format!("{}.{}", node.id, output.key)
            } else {
                output.key.clone()
            };
            let mut producers = outputs
                .shift_remove(&key)
                .map(|shape| shape.producers)
                .unwrap_or_default();
            producers.push(node.id.clone());
            outputs.insert(
                key,
                OutputShape {
                    node_id: node.id.clone(),
                    output_type: output.output_type.clone(),
                    structure: output.structure.clone(),
                    producers,
                },
            );
        }
    }
    outputs
}

/// Canonical spelling of a type string; union members are normalised individually.
pub fn normalize_type(type_name: &str) -> String {
    type_name
        .split('|')
        .map(|member| {
            let member = member.trim().to_ascii_lowercase();
            match member.as_str() {
                "object" | "dictionary" | "map" => "dict".to_string(),
                "array" => "list".to_string(),
                "string" => "str".to_string(),
                "integer" => "int".to_string(),
                "number" => "float".to_string(),
                "boolean" => "bool".to_string(),
                "" => ANY.to_string(),
                _ => member,
            }
        })
        .collect::<Vec<_>>()
        .join("|")
}

fn members(type_name: &str) -> impl Iterator<Item = &str> {
    type_name.split('|')
}

fn is_union(type_name: &str) -> bool {
    type_name.contains('|')
}

/// Whether a value of `source_type` may be passed where `target_type` is declared.
pub fn is_type_compatible(source_type: &str, target_type: &str) -> bool {
    let source = normalize_type(source_type);
    let target = normalize_type(target_type);
    compatible(&source, &target)
}

fn compatible(source: &str, target: &str) -> bool {
    if source == ANY || target == ANY {
        return true;
    }
    if is_union(source) {
        return members(source).all(|member| compatible(member, target));
    }
    if is_union(target) {
        return members(target).any(|member| compatible(source, member));
    }
    if source == target {
        return true;
    }
    matches!(
        (source, target),
        ("int", "float") | ("int", "str") | ("float", "str") | ("bool", "str")
    )
}

/// Whether a field access can be applied to a value of this type.
pub fn is_traversable(type_name: &str) -> bool {
    members(&normalize_type(type_name)).any(|member| member == "dict" || member == ANY)
}

fn is_indexable(type_name: &str) -> bool {
    members(&normalize_type(type_name)).any(|member| member == "list" || member == ANY)
}

/// Infer the type a template path will resolve to, without running anything.
///
/// `None` means the type cannot be determined statically.
pub fn infer_template_type(path: &str, ir: &WorkflowIr, node_outputs: &NodeOutputs) -> Option<String> {
    let segments = parse_path(path).ok()?;
    let PathSegment::Field(root) = segments.first()? else {
        return None;
    };

    if let Some(input) = ir.inputs.get(root) {
        let input_type = input
            .input_type
            .as_deref()
            .map(normalize_type)
            .unwrap_or_else(|| ANY.to_string());
        return traverse(&input_type, None, &segments[1..]);
    }

    if ir.enable_namespacing {
        match segments.get(1) {
            None => ir.node(root).map(|_| "dict".to_string()),
            Some(PathSegment::Field(key)) => {
                let shape = node_outputs.get(&format!("{}.{}", root, key))?;
                traverse(
                    &normalize_type(&shape.output_type),
                    Some(&shape.structure),
                    &segments[2..],
                )
            }
            Some(PathSegment::Index(_)) => None,
        }
    } else {
        let shape = node_outputs.get(root.as_str())?;
        traverse(
            &normalize_type(&shape.output_type),
            Some(&shape.structure),
            &segments[1..],
        )
    }
}

fn traverse(
    base_type: &str,
    structure: Option<&IndexMap<String, StructureField>>,
    rest: &[PathSegment],
) -> Option<String> {
    let mut current = base_type.to_string();
    let mut structure = structure;

    for segment in rest {
        match segment {
            PathSegment::Field(name) => {
                if let Some(field) = structure.and_then(|fields| fields.get(name)) {
                    current = normalize_type(&field.field_type);
                    structure = Some(&field.structure);
                } else if is_traversable(&current) {
                    return Some(ANY.to_string());
                } else {
                    return None;
                }
            }
            PathSegment::Index(_) => {
                if !is_indexable(&current) {
                    return None;
                }
                current = ANY.to_string();
                structure = None;
            }
        }
    }
    Some(current)
}

/// Declared type of `param_key` on `node_type`; undeclared types read as `any`.
pub fn get_parameter_type(node_type: &str, param_key: &str, registry: &Registry) -> Option<String> {
    let spec = registry.get(node_type)?.param(param_key)?;
    if spec.param_type.trim().is_empty() {
        Some(ANY.to_string())
    } else {
        Some(normalize_type(&spec.param_type))
    }
}

/// Named fields of a traversable output, used to suggest a narrower path.
pub fn structure_fields(path: &str, ir: &WorkflowIr, node_outputs: &NodeOutputs) -> Vec<String> {
    let Ok(segments) = parse_path(path) else {
        return Vec::new();
    };
    let (Some(PathSegment::Field(root)), true) = (segments.first(), ir.enable_namespacing) else {
        return Vec::new();
    };
    let Some(PathSegment::Field(key)) = segments.get(1) else {
        return Vec::new();
    };
    let Some(shape) = node_outputs.get(&format!("{}.{}", root, key)) else {
        return Vec::new();
    };

    let mut fields = &shape.structure;
    for segment in &segments[2..] {
        match segment {
            PathSegment::Field(name) => match fields.get(name) {
                Some(field) => fields = &field.structure,
                None => return Vec::new(),
            },
            PathSegment::Index(_) => return Vec::new(),
        }
    }
    fields.keys().cloned().collect()
}
