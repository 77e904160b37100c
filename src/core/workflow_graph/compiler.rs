#![allow(clippy::result_large_err)] // Compiler returns AppError to carry validation findings as structured context.

use crate::core::error::AppError;
use crate::core::template::has_templates;
use crate::core::types::{ErrorCategory, ResolutionMode};
use crate::core::workflow_graph::flow::{Flow, FlowNode, DEFAULT_MAX_STEPS};
use crate::core::workflow_graph::node::{GraphNode, NodeContext, NodeRegistry};
use crate::core::workflow_graph::validator::{validate_workflow_templates, ValidationReport};
use crate::core::workflow_graph::wrapper::{InstrumentedNode, TemplateAwareNode};
use indexmap::IndexMap;
use pflow_types::WorkflowIr;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Workflow inputs and planner-supplied values; they win over store values.
    pub initial_params: Map<String, Value>,
    /// Refuse to compile when template validation reports errors.
    pub validate: bool,
    pub resolution_mode: ResolutionMode,
    pub max_steps: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            initial_params: Map::new(),
            validate: true,
            resolution_mode: ResolutionMode::Strict,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

pub struct CompiledWorkflow {
    pub flow: Flow,
    pub report: ValidationReport,
    /// Initial params after declared input defaults were applied.
    pub initial_params: Map<String, Value>,
}

/// Build an executable flow from workflow IR.
pub fn compile_ir_to_flow(
    ir: &WorkflowIr,
    registry: &NodeRegistry,
    options: CompileOptions,
) -> Result<CompiledWorkflow, AppError> {
    check_structure(ir)?;
    let initial_params = prepare_inputs(ir, options.initial_params);

    let report = validate_workflow_templates(ir, &initial_params, registry.metadata());
    for warning in report.warnings() {
        tracing::warn!("template validation: {}", warning);
    }
    if options.validate && report.has_errors() {
        let errors = report.errors();
        let mut error = AppError::new(
            ErrorCategory::ValidationError,
            format!(
                "workflow failed template validation with {} error(s): {}",
                errors.len(),
                errors.join("; ")
            ),
        )
        .with_code("PFL-CMP-003");
        for diagnostic in report.diagnostics().iter().filter(|d| d.is_error()) {
            if let Some(suggestion) = &diagnostic.suggestion {
                error = error.with_suggestion(suggestion.clone());
            }
        }
        return Err(error);
    }
    if !options.validate {
        check_required_inputs(ir, &initial_params)?;
    }

    let mut nodes = IndexMap::new();
    for ir_node in &ir.nodes {
        let mut node: Box<dyn GraphNode> = registry.create(ir_node)?;
        if ir_node.params.values().any(has_templates) {
            node = Box::new(TemplateAwareNode::new(
                node,
                ir_node.id.clone(),
                &ir_node.params,
                initial_params.clone(),
                registry.metadata().get(&ir_node.node_type),
                options.resolution_mode,
            ));
        }
        let node: Box<dyn GraphNode> = Box::new(InstrumentedNode::new(node));
        nodes.insert(
            ir_node.id.clone(),
            FlowNode {
                ctx: NodeContext::from_ir(ir_node, ir.enable_namespacing),
                node,
                successors: HashMap::new(),
            },
        );
    }

    for edge in &ir.edges {
        if let Some(source) = nodes.get_mut(&edge.from) {
            if let Some(previous) = source.successors.insert(edge.action.clone(), edge.to.clone()) {
                tracing::warn!(
                    from = %edge.from,
                    action = %edge.action,
                    "edge to '{}' replaces earlier edge to '{}'",
                    edge.to,
                    previous
                );
            }
        }
    }

    tracing::debug!(nodes = nodes.len(), edges = ir.edges.len(), "compiled workflow");
    Ok(CompiledWorkflow {
        flow: Flow::new(nodes, ir.outputs.clone())
            .with_initial_params(initial_params.clone())
            .with_max_steps(options.max_steps),
        report,
        initial_params,
    })
}

fn check_structure(ir: &WorkflowIr) -> Result<(), AppError> {
    if ir.nodes.is_empty() {
        return Err(structure_error("workflow declares no nodes".to_string()));
    }
    let mut seen = HashSet::new();
    for node in &ir.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(structure_error(format!("duplicate node id '{}'", node.id)));
        }
    }
    for edge in &ir.edges {
        for endpoint in [&edge.from, &edge.to] {
            if !seen.contains(endpoint.as_str()) {
                return Err(structure_error(format!(
                    "edge {} -> {} references unknown node '{}'",
                    edge.from, edge.to, endpoint
                )));
            }
        }
    }
    Ok(())
}

fn structure_error(message: String) -> AppError {
    AppError::new(ErrorCategory::ValidationError, message).with_code("PFL-CMP-002")
}

/// Fill declared inputs missing from `initial_params` with their defaults.
pub fn prepare_inputs(ir: &WorkflowIr, mut initial_params: Map<String, Value>) -> Map<String, Value> {
    for (name, input) in &ir.inputs {
        if initial_params.contains_key(name) {
            continue;
        }
        if let Some(default) = &input.default {
            initial_params.insert(name.clone(), default.clone());
        }
    }
    initial_params
}

fn check_required_inputs(ir: &WorkflowIr, params: &Map<String, Value>) -> Result<(), AppError> {
    let missing: Vec<&str> = ir
        .inputs
        .iter()
        .filter(|(name, input)| input.required && !params.contains_key(name.as_str()))
        .map(|(name, _)| name.as_str())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::new(
        ErrorCategory::ValidationError,
        format!("required workflow input(s) not provided: {}", missing.join(", ")),
    )
    .with_code("PFL-CMP-004"))
}
