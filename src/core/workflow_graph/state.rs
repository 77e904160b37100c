#![allow(clippy::result_large_err)] // State helpers return AppError to keep the structured code and context.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Per-node checkpoint bookkeeping kept under the shared store's execution key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    #[serde(default)]
    pub completed_nodes: Vec<String>,
    #[serde(default)]
    pub node_actions: BTreeMap<String, String>,
    #[serde(default)]
    pub node_hashes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_node: Option<String>,
}

/// Lifecycle position of a node within one shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    NotStarted,
    Completed,
    Failed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::NotStarted => "not_started",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
        }
    }
}

impl ExecutionMetadata {
    pub fn from_value(value: &Value) -> Result<Self, AppError> {
        serde_json::from_value(value.clone()).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("execution metadata in the shared store is malformed: {}", err),
            )
            .with_code("PFL-CKP-003")
        })
    }

    pub fn to_value(&self) -> Result<Value, AppError> {
        serde_json::to_value(self).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to serialize execution metadata: {}", err),
            )
            .with_code("PFL-CKP-003")
        })
    }

    pub fn is_completed(&self, node_id: &str) -> bool {
        self.completed_nodes.iter().any(|id| id == node_id)
    }

    /// Recorded action for `node_id`, only when it completed with `params_hash`.
    pub fn cached_action(&self, node_id: &str, params_hash: &str) -> Option<&str> {
        if !self.is_completed(node_id) {
            return None;
        }
        match self.node_hashes.get(node_id) {
            Some(stored) if stored == params_hash => {
                self.node_actions.get(node_id).map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn mark_completed(&mut self, node_id: &str, action: &str, params_hash: &str) {
        if !self.is_completed(node_id) {
            self.completed_nodes.push(node_id.to_string());
        }
        self.node_actions
            .insert(node_id.to_string(), action.to_string());
        self.node_hashes
            .insert(node_id.to_string(), params_hash.to_string());
        if self.failed_node.as_deref() == Some(node_id) {
            self.failed_node = None;
        }
    }

    /// Record a failure; any earlier completion of the node is forgotten.
    pub fn mark_failed(&mut self, node_id: &str) {
        self.completed_nodes.retain(|id| id != node_id);
        self.node_actions.remove(node_id);
        self.node_hashes.remove(node_id);
        self.failed_node = Some(node_id.to_string());
    }

    pub fn status(&self, node_id: &str) -> NodeStatus {
        if self.is_completed(node_id) {
            NodeStatus::Completed
        } else if self.failed_node.as_deref() == Some(node_id) {
            NodeStatus::Failed
        } else {
            NodeStatus::NotStarted
        }
    }
}

/// Compute the SHA-256 hash encoded as lowercase hex.
pub fn compute_sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Serialize `value` with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Hash identifying a node invocation: its type plus the parameters it runs with.
pub fn params_hash(node_type: &str, params: &Map<String, Value>) -> String {
    let mut identity = Map::new();
    identity.insert("type".to_string(), Value::String(node_type.to_string()));
    identity.insert("params".to_string(), Value::Object(params.clone()));
    compute_sha256_hex(canonical_json(&Value::Object(identity)).as_bytes())
}
