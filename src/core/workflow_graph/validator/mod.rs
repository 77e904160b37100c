//! Pre-flight validation of every template in a workflow.
//!
//! The pass is read-only and collects every finding instead of stopping at
//! the first one. Callers decide whether errors are fatal.

pub mod diagnostic;
pub mod ordering;

pub use diagnostic::{Diagnostic, DiagnosticSeverity, ValidationReport};
pub use ordering::{ExecutionOrder, Reference};

use crate::core::template::{
    marker_mismatch, simple_template_path, split_root, stringify, template_paths, template_sites,
    TemplateSite,
};
use crate::core::workflow_graph::type_checker::{
    build_node_outputs, get_parameter_type, infer_template_type, is_traversable,
    is_type_compatible, structure_fields, NodeOutputs,
};
use pflow_types::{InputSpec, IrNode, Registry, WorkflowIr};
use serde_json::{Map, Value};
use std::collections::HashSet;

pub const MALFORMED_SYNTAX: &str = "TPL-VAL-001";
pub const MISSING_INPUT: &str = "TPL-VAL-002";
pub const NO_SOURCE: &str = "TPL-VAL-003";
pub const ORDERING: &str = "TPL-VAL-004";
pub const CIRCULAR_DEPENDENCY: &str = "TPL-VAL-005";
pub const TYPE_MISMATCH: &str = "TPL-VAL-006";
pub const UNKNOWN_OUTPUT: &str = "TPL-VAL-007";
pub const UNUSED_INPUT: &str = "TPL-VAL-008";
pub const UNKNOWN_NODE_TYPE: &str = "TPL-VAL-009";
pub const INVALID_OUTPUT_SOURCE: &str = "TPL-VAL-010";

/// Validate every template in `ir` against declared inputs, supplied
/// parameters and the declared outputs of earlier nodes.
pub fn validate_workflow_templates(
    ir: &WorkflowIr,
    available_params: &Map<String, Value>,
    registry: &Registry,
) -> ValidationReport {
    TemplateValidator::new(ir, available_params, registry).run()
}

struct TemplateValidator<'a> {
    ir: &'a WorkflowIr,
    available_params: &'a Map<String, Value>,
    registry: &'a Registry,
    node_outputs: NodeOutputs,
    order: ExecutionOrder,
    used_roots: HashSet<String>,
    report: ValidationReport,
}

impl<'a> TemplateValidator<'a> {
    fn new(ir: &'a WorkflowIr, available_params: &'a Map<String, Value>, registry: &'a Registry) -> Self {
        Self {
            ir,
            available_params,
            registry,
            node_outputs: build_node_outputs(ir, registry),
            order: ExecutionOrder::new(ir),
            used_roots: HashSet::new(),
            report: ValidationReport::new(),
        }
    }

    fn run(mut self) -> ValidationReport {
        let ir = self.ir;
        for node in &ir.nodes {
            if !self.registry.contains(&node.node_type) {
                self.report.push(
                    Diagnostic::warning(
                        UNKNOWN_NODE_TYPE,
                        format!(
                            "Node '{}' has unknown type '{}'; its parameters and outputs cannot be type checked",
                            node.id, node.node_type
                        ),
                    )
                    .on_node(&node.id),
                );
            }
            for site in template_sites(&node.params) {
                self.check_site(node, &site);
            }
        }
        self.check_workflow_outputs();
        self.check_unused_inputs();

        tracing::debug!(
            errors = self.report.errors().len(),
            warnings = self.report.warnings().len(),
            "template validation finished"
        );
        self.report
    }

    fn check_site(&mut self, node: &IrNode, site: &TemplateSite<'_>) {
        if let Some((openings, valid)) = marker_mismatch(site.text) {
            self.report.push(
                Diagnostic::error(
                    MALFORMED_SYNTAX,
                    format!(
                        "Malformed template syntax in node '{}' parameter '{}': found {} '${{' opening(s) but {} valid template(s) in '{}'",
                        node.id, site.path, openings, valid, site.text
                    ),
                )
                .at(&node.id, &site.path)
                .with_suggestion("close every '${' with '}' and use paths like ${node.output.field} or ${items[0]}"),
            );
        }

        let simple = simple_template_path(site.text);
        for path in template_paths(site.text) {
            if self.check_source(node, site, path) && site.top_level && simple == Some(path) {
                self.check_type(node, site, path);
            }
        }
    }

    /// Returns true when the template's root resolves to a known source.
    fn check_source(&mut self, node: &IrNode, site: &TemplateSite<'_>, path: &str) -> bool {
        let ir = self.ir;
        let (root, rest) = split_root(path);
        self.used_roots.insert(root.to_string());

        if let Some(input) = ir.inputs.get(root) {
            if self.available_params.contains_key(root) {
                return true;
            }
            self.report.push(
                Diagnostic::error(MISSING_INPUT, missing_input_message(root, input, rest))
                    .at(&node.id, &site.path)
                    .with_suggestion(format!("pass a value for '{}' when running the workflow", root)),
            );
            return false;
        }

        if self.available_params.contains_key(root) {
            return true;
        }

        let producer = if self.ir.enable_namespacing {
            self.order.contains(root).then(|| root.to_string())
        } else {
            self.node_outputs
                .get(root)
                .and_then(|shape| self.flat_producer(&shape.producers, &node.id))
        };
        let Some(producer) = producer else {
            self.report.push(
                Diagnostic::error(
                    NO_SOURCE,
                    format!(
                        "Template '${{{}}}' in node '{}' parameter '{}' has no valid source: '{}' is not a declared input, a supplied parameter or a node output",
                        path, node.id, site.path, root
                    ),
                )
                .at(&node.id, &site.path),
            );
            return false;
        };

        if !self.check_ordering(node, site, path, &producer) {
            return false;
        }
        if self.ir.enable_namespacing {
            return self.check_output_key(node, site, path, &producer, rest);
        }
        true
    }

    /// In flat mode any node declaring the key may supply it; prefer one that
    /// runs before `consumer`, else the last declarer so ordering is reported.
    fn flat_producer(&self, producers: &[String], consumer: &str) -> Option<String> {
        producers
            .iter()
            .find(|producer| {
                matches!(
                    self.order.classify(producer, consumer),
                    Some(Reference::Predecessor)
                )
            })
            .or_else(|| producers.last())
            .cloned()
    }

    fn check_ordering(&mut self, node: &IrNode, site: &TemplateSite<'_>, path: &str, producer: &str) -> bool {
        let Some(reference) = self.order.classify(producer, &node.id) else {
            return true;
        };
        let diagnostic = match reference {
            Reference::Predecessor => return true,
            Reference::SelfReference => Diagnostic::error(
                ORDERING,
                format!(
                    "Node '{}' references its own output in '${{{}}}' (parameter '{}'); a node can only read outputs of nodes that run before it",
                    node.id, path, site.path
                ),
            ),
            Reference::Circular(members) => Diagnostic::error(
                CIRCULAR_DEPENDENCY,
                format!(
                    "Circular dependency: node '{}' references '${{{}}}' but '{}' and '{}' are on the cycle {}",
                    node.id,
                    path,
                    producer,
                    node.id,
                    members.join(" -> ")
                ),
            )
            .with_suggestion("remove the back edge or read the value from a workflow input"),
            Reference::NotPredecessor => Diagnostic::error(
                ORDERING,
                format!(
                    "Node '{}' references '${{{}}}' but '{}' does not run before it; '{}' must execute after '{}'",
                    node.id, path, producer, node.id, producer
                ),
            )
            .with_suggestion(format!(
                "add an edge path from '{}' to '{}' or reorder the nodes",
                producer, node.id
            )),
        };
        self.report.push(diagnostic.at(&node.id, &site.path));
        false
    }

    fn check_output_key(
        &mut self,
        node: &IrNode,
        site: &TemplateSite<'_>,
        path: &str,
        producer: &str,
        rest: &str,
    ) -> bool {
        if rest.is_empty() || rest.starts_with('[') {
            return true;
        }
        let (ir, registry) = (self.ir, self.registry);
        let Some(producer_node) = ir.node(producer) else {
            return true;
        };
        let Some(metadata) = registry.get(&producer_node.node_type) else {
            return true;
        };
        let key = split_root(rest).0;
        if metadata.output(key).is_some() {
            return true;
        }
        let available = metadata.output_keys();
        self.report.push(
            Diagnostic::error(
                UNKNOWN_OUTPUT,
                format!(
                    "Node '{}' references '${{{}}}' but node '{}' (type '{}') does not declare output '{}'; available outputs: {}",
                    node.id,
                    path,
                    producer,
                    producer_node.node_type,
                    key,
                    if available.is_empty() {
                        "none".to_string()
                    } else {
                        available.join(", ")
                    }
                ),
            )
            .at(&node.id, &site.path),
        );
        false
    }

    fn check_type(&mut self, node: &IrNode, site: &TemplateSite<'_>, path: &str) {
        let Some(expected) = get_parameter_type(&node.node_type, site.param, self.registry) else {
            return;
        };
        let Some(inferred) = infer_template_type(path, self.ir, &self.node_outputs) else {
            return;
        };
        if is_type_compatible(&inferred, &expected) {
            return;
        }

        let mut diagnostic = Diagnostic::error(
            TYPE_MISMATCH,
            format!(
                "Type mismatch in node '{}' parameter '{}': template '${{{}}}' has type '{}' but the parameter expects '{}'",
                node.id, site.param, path, inferred, expected
            ),
        )
        .at(&node.id, &site.path)
        .with_types(&inferred, &expected);

        if is_traversable(&inferred) {
            let fields = structure_fields(path, self.ir, &self.node_outputs);
            let suggestion = match fields.first() {
                Some(first) => format!(
                    "access a specific field instead, e.g. ${{{}.{}}} (available: {})",
                    path,
                    first,
                    fields.join(", ")
                ),
                None => format!("access a specific field of '${{{}}}' instead", path),
            };
            diagnostic = diagnostic.with_suggestion(suggestion);
        }
        self.report.push(diagnostic);
    }

    fn check_workflow_outputs(&mut self) {
        let ir = self.ir;
        for (name, output) in &ir.outputs {
            let source = output.source.trim();
            let path = simple_template_path(source).unwrap_or(source);
            let root = split_root(path).0;
            self.used_roots.insert(root.to_string());

            let known = ir.node(root).is_some()
                || ir.inputs.contains_key(root)
                || self.available_params.contains_key(root)
                || (!ir.enable_namespacing && self.node_outputs.contains_key(root));
            if !known {
                self.report.push(Diagnostic::error(
                    INVALID_OUTPUT_SOURCE,
                    format!(
                        "Workflow output '{}' has source '{}' which does not reference a node, an input or a parameter",
                        name, output.source
                    ),
                ));
            }
        }
    }

    fn check_unused_inputs(&mut self) {
        let ir = self.ir;
        for name in ir.inputs.keys() {
            if !self.used_roots.contains(name) {
                self.report.push(
                    Diagnostic::warning(
                        UNUSED_INPUT,
                        format!("Declared input '{}' is never used by any template", name),
                    )
                    .with_suggestion(format!("remove input '{}' or reference it as ${{{}}}", name, name)),
                );
            }
        }
    }
}

fn missing_input_message(name: &str, input: &InputSpec, rest: &str) -> String {
    let description = if input.description.trim().is_empty() {
        "no description provided"
    } else {
        input.description.trim()
    };
    let status = match (&input.default, input.required) {
        (Some(default), _) => format!("optional, default: {}", stringify(default)),
        (None, true) => "required".to_string(),
        (None, false) => "optional".to_string(),
    };
    let mut message = format!(
        "Required input '${{{}}}' not provided - {} ({})",
        name, description, status
    );
    if !rest.is_empty() {
        message.push_str(&format!(", attempted to access path '{}'", rest));
    }
    message
}
