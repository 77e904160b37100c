#![allow(clippy::result_large_err)] // Flow execution returns AppError to keep node failure context intact.

use crate::core::error::AppError;
use crate::core::template::{
    contains_template, interpolate, resolution_context, resolve_value, simple_template_path,
};
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::node::{GraphNode, NodeContext};
use crate::core::workflow_graph::shared_store::SharedStore;
use indexmap::IndexMap;
use pflow_types::{OutputSpec, DEFAULT_ACTION};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const DEFAULT_MAX_STEPS: usize = 1000;

/// A compiled node plus its outgoing edges keyed by action.
pub struct FlowNode {
    pub ctx: NodeContext,
    pub node: Box<dyn GraphNode>,
    pub successors: HashMap<String, String>,
}

/// Summary of one flow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutcome {
    pub visited: Vec<String>,
    pub last_action: Option<String>,
}

/// Executable graph: nodes run one at a time, the returned action picks the next.
pub struct Flow {
    nodes: IndexMap<String, FlowNode>,
    start: Option<String>,
    outputs: IndexMap<String, OutputSpec>,
    initial_params: Map<String, Value>,
    max_steps: usize,
}

impl Flow {
    pub fn new(nodes: IndexMap<String, FlowNode>, outputs: IndexMap<String, OutputSpec>) -> Self {
        let start = nodes.keys().next().cloned();
        Self {
            nodes,
            start,
            outputs,
            initial_params: Map::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Workflow inputs seeded into the store at run start.
    pub fn with_initial_params(mut self, initial_params: Map<String, Value>) -> Self {
        self.initial_params = initial_params;
        self
    }

    pub fn start_node(&self) -> Option<&str> {
        self.start.as_deref()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn successors(&self, node_id: &str) -> Option<&HashMap<String, String>> {
        self.nodes.get(node_id).map(|node| &node.successors)
    }

    pub async fn run(&self, shared: &mut SharedStore) -> Result<FlowOutcome, AppError> {
        let mut outcome = FlowOutcome {
            visited: Vec::new(),
            last_action: None,
        };
        let mut current = self.start.clone();
        shared.seed(&self.initial_params);

        while let Some(node_id) = current {
            if outcome.visited.len() >= self.max_steps {
                return Err(AppError::new(
                    ErrorCategory::NodeExecutionError,
                    format!(
                        "flow exceeded the limit of {} node executions at node '{}'",
                        self.max_steps, node_id
                    ),
                )
                .with_code("PFL-RUN-002")
                .with_suggestion("check for unintended loops or raise execution.max_steps"));
            }
            let entry = self.nodes.get(&node_id).ok_or_else(|| {
                AppError::new(
                    ErrorCategory::InternalError,
                    format!("flow references unknown node '{}'", node_id),
                )
                .with_code("PFL-RUN-001")
            })?;

            let action = entry.node.run(&entry.ctx, shared).await?;
            let action = if action.is_empty() {
                DEFAULT_ACTION.to_string()
            } else {
                action
            };
            outcome.visited.push(node_id.clone());

            current = entry.successors.get(&action).cloned();
            if current.is_none() && !entry.successors.is_empty() {
                let mut known: Vec<&str> = entry.successors.keys().map(String::as_str).collect();
                known.sort();
                tracing::warn!(
                    node_id = %node_id,
                    action = %action,
                    "flow ends: no edge for action (edges: {})",
                    known.join(", ")
                );
            }
            outcome.last_action = Some(action);
        }

        tracing::info!(steps = outcome.visited.len(), "flow finished");
        Ok(outcome)
    }

    /// Resolve declared workflow outputs against the store with the initial
    /// params layered on top; unresolvable ones are skipped.
    pub fn collect_outputs(&self, shared: &SharedStore) -> Map<String, Value> {
        let context = resolution_context(shared.data(), &self.initial_params);
        collect_outputs(&self.outputs, &context)
    }
}

pub fn collect_outputs(outputs: &IndexMap<String, OutputSpec>, data: &Map<String, Value>) -> Map<String, Value> {
    let mut collected = Map::new();
    for (name, spec) in outputs {
        let source = spec.source.trim();
        let value = match simple_template_path(source) {
            Some(path) => resolve_value(path, data),
            None if contains_template(source) => Some(Value::String(interpolate(source, data))),
            None => resolve_value(source, data),
        };
        match value {
            Some(value) => {
                collected.insert(name.clone(), value);
            }
            None => tracing::warn!(output = %name, source = %spec.source, "workflow output could not be resolved"),
        }
    }
    collected
}
