use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Action returned by a node when it has no more specific outcome.
pub const DEFAULT_ACTION: &str = "default";

fn default_ir_version() -> String {
    "0.1.0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_action() -> String {
    DEFAULT_ACTION.to_string()
}

/// Declarative workflow graph consumed by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowIr {
    #[serde(default = "default_ir_version")]
    pub ir_version: String,
    pub nodes: Vec<IrNode>,
    #[serde(default)]
    pub edges: Vec<IrEdge>,
    #[serde(default)]
    pub inputs: IndexMap<String, InputSpec>,
    #[serde(default)]
    pub outputs: IndexMap<String, OutputSpec>,
    #[serde(default = "default_true")]
    pub enable_namespacing: bool,
}

impl WorkflowIr {
    pub fn node(&self, id: &str) -> Option<&IrNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.id.as_str())
    }
}

/// A single node declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

/// Directed edge, taken when the source node returns `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrEdge {
    pub from: String,
    pub to: String,
    #[serde(default = "default_action")]
    pub action: String,
}

/// Declared workflow input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}

impl Default for InputSpec {
    fn default() -> Self {
        Self {
            description: String::new(),
            required: true,
            default: None,
            input_type: None,
        }
    }
}

/// Declared workflow output, read from `source` after the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    #[serde(default)]
    pub description: String,
    pub source: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
}
