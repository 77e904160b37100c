#![allow(clippy::result_large_err)] // Node traits and registry return AppError directly for structured diagnostics without boxing.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::shared_store::SharedStore;
use async_trait::async_trait;
use pflow_types::{IrNode, NodeMetadata, Registry, DEFAULT_ACTION};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Identity and parameters of one node invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeContext {
    pub node_id: String,
    pub node_type: String,
    pub params: Map<String, Value>,
    /// Outputs go under `shared[node_id]` rather than the store root.
    pub namespaced: bool,
}

impl NodeContext {
    pub fn new(node_id: impl Into<String>, node_type: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            node_id: node_id.into(),
            node_type: node_type.into(),
            params,
            namespaced: true,
        }
    }

    pub fn from_ir(node: &IrNode, namespaced: bool) -> Self {
        Self {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            params: node.params.clone(),
            namespaced,
        }
    }

    /// Same node, different parameter set.
    pub fn with_params(&self, params: Map<String, Value>) -> Self {
        Self {
            params,
            ..self.clone()
        }
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Fetch a string param or fail with a node error naming it.
    pub fn require_str(&self, key: &str) -> Result<&str, AppError> {
        self.str_param(key).ok_or_else(|| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!(
                    "node '{}' ({}) requires string param '{}'",
                    self.node_id, self.node_type, key
                ),
            )
            .with_code("PFL-NODE-001")
        })
    }

    pub fn write_output(&self, shared: &mut SharedStore, key: &str, value: Value) {
        if self.namespaced {
            shared.insert_namespaced(&self.node_id, key, value);
        } else {
            shared.insert(key, value);
        }
    }
}

/// Three-stage lifecycle implemented by leaf nodes.
///
/// `prep` reads what the node needs, `exec` does the work without touching
/// the store, and `post` writes outputs and picks the action that selects
/// the next edge.
#[async_trait]
pub trait Node: Send + Sync + 'static {
    fn prep(&self, ctx: &NodeContext, _shared: &SharedStore) -> Result<Value, AppError> {
        Ok(Value::Object(ctx.params.clone()))
    }

    async fn exec(&self, ctx: &NodeContext, prep: Value) -> Result<Value, AppError>;

    fn post(
        &self,
        ctx: &NodeContext,
        shared: &mut SharedStore,
        prep: &Value,
        exec: Value,
    ) -> Result<String, AppError>;
}

/// Anything the flow can run: a leaf node or a wrapper around one.
#[async_trait]
pub trait GraphNode: Send + Sync {
    /// Run the whole lifecycle and return the action.
    async fn run(&self, ctx: &NodeContext, shared: &mut SharedStore) -> Result<String, AppError>;

    /// Parameters the node would run with against the current store.
    fn effective_params(&self, ctx: &NodeContext, _shared: &SharedStore) -> Map<String, Value> {
        ctx.params.clone()
    }
}

#[async_trait]
impl<T: Node> GraphNode for T {
    async fn run(&self, ctx: &NodeContext, shared: &mut SharedStore) -> Result<String, AppError> {
        let prep = self.prep(ctx, shared)?;
        let exec = self.exec(ctx, prep.clone()).await?;
        self.post(ctx, shared, &prep, exec)
    }
}

pub fn default_action() -> String {
    DEFAULT_ACTION.to_string()
}

/// Builds a node instance from its IR declaration.
pub type NodeFactory = Arc<dyn Fn(&IrNode) -> Result<Box<dyn GraphNode>, AppError> + Send + Sync>;

struct NodeEntry {
    metadata: NodeMetadata,
    factory: NodeFactory,
}

/// Builder used to register node types before compilation.
pub struct NodeRegistryBuilder {
    entries: HashMap<String, NodeEntry>,
    order: Vec<String>,
}

impl Default for NodeRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistryBuilder {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register<F>(&mut self, node_type: &str, metadata: NodeMetadata, factory: F) -> &mut Self
    where
        F: Fn(&IrNode) -> Result<Box<dyn GraphNode>, AppError> + Send + Sync + 'static,
    {
        if self.entries.contains_key(node_type) {
            panic!("duplicate node type registered: {}", node_type);
        }
        self.order.push(node_type.to_string());
        self.entries.insert(
            node_type.to_string(),
            NodeEntry {
                metadata,
                factory: Arc::new(factory),
            },
        );
        self
    }

    pub fn build(self) -> NodeRegistry {
        let mut metadata = Registry::new();
        for node_type in &self.order {
            if let Some(entry) = self.entries.get(node_type) {
                metadata.insert(node_type.clone(), entry.metadata.clone());
            }
        }
        let factories = self
            .entries
            .into_iter()
            .map(|(name, entry)| (name, entry.factory))
            .collect();
        NodeRegistry {
            factories: Arc::new(factories),
            metadata: Arc::new(metadata),
        }
    }
}

/// Immutable lookup of node factories and their interface metadata.
#[derive(Clone)]
pub struct NodeRegistry {
    factories: Arc<HashMap<String, NodeFactory>>,
    metadata: Arc<Registry>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistryBuilder::new().build()
    }

    pub fn builder() -> NodeRegistryBuilder {
        NodeRegistryBuilder::new()
    }

    pub fn metadata(&self) -> &Registry {
        &self.metadata
    }

    /// Overlay externally declared metadata; factories are unchanged.
    pub fn with_metadata(mut self, extra: Registry) -> Self {
        let mut merged = (*self.metadata).clone();
        merged.merge(extra);
        self.metadata = Arc::new(merged);
        self
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    pub fn create(&self, node: &IrNode) -> Result<Box<dyn GraphNode>, AppError> {
        let factory = self.factories.get(&node.node_type).ok_or_else(|| {
            let mut known: Vec<&str> = self.factories.keys().map(String::as_str).collect();
            known.sort();
            AppError::new(
                ErrorCategory::ValidationError,
                format!(
                    "node '{}' has unknown type '{}'",
                    node.id, node.node_type
                ),
            )
            .with_code("PFL-CMP-001")
            .with_suggestion(format!("known node types: {}", known.join(", ")))
        })?;
        factory(node)
    }
}
