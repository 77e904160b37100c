#![allow(clippy::result_large_err)]

//! The mutable key-value store nodes communicate through.
//!
//! User data lives at the root or under per-node namespaces. Keys starting
//! with `__` are reserved: [`EXECUTION_KEY`] is written only by the
//! checkpoint layer and [`TEMPLATE_ERRORS_KEY`] only by the template layer.

use crate::core::error::AppError;
use crate::core::workflow_graph::state::{ExecutionMetadata, NodeStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub const EXECUTION_KEY: &str = "__execution__";
pub const TEMPLATE_ERRORS_KEY: &str = "__template_errors__";
const RESERVED_PREFIX: &str = "__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Start,
    Cached,
    Complete,
    Failed,
}

/// Notification sent to a registered progress callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub node_id: String,
    pub kind: ProgressKind,
    pub duration_ms: Option<u64>,
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Template problem recorded instead of raised in permissive mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateErrorRecord {
    pub node_id: String,
    pub param: String,
    pub message: String,
}

#[derive(Clone, Default)]
pub struct SharedStore {
    data: Map<String, Value>,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStore")
            .field("data", &self.data)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: Map<String, Value>) -> Self {
        Self {
            data,
            progress: None,
        }
    }

    pub fn is_reserved(key: &str) -> bool {
        key.starts_with(RESERVED_PREFIX)
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    /// Seed workflow inputs at the root; keys already present are kept.
    pub fn seed(&mut self, inputs: &Map<String, Value>) {
        for (key, value) in inputs {
            if Self::is_reserved(key) {
                continue;
            }
            self.data.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Write `value` under `shared[namespace][key]`, creating the namespace.
    ///
    /// A non-object value already stored at `namespace` is replaced.
    pub fn insert_namespaced(&mut self, namespace: &str, key: impl Into<String>, value: Value) {
        let slot = self
            .data
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(map) = slot {
            map.insert(key.into(), value);
        }
    }

    /// User-visible entries, without reserved keys.
    pub fn user_data(&self) -> Map<String, Value> {
        self.data
            .iter()
            .filter(|(key, _)| !Self::is_reserved(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    pub fn emit(&self, node_id: &str, kind: ProgressKind, duration_ms: Option<u64>) {
        if let Some(callback) = &self.progress {
            callback(&ProgressEvent {
                node_id: node_id.to_string(),
                kind,
                duration_ms,
            });
        }
    }

    pub fn execution(&self) -> Result<ExecutionMetadata, AppError> {
        match self.data.get(EXECUTION_KEY) {
            Some(value) => ExecutionMetadata::from_value(value),
            None => Ok(ExecutionMetadata::default()),
        }
    }

    pub fn set_execution(&mut self, metadata: &ExecutionMetadata) -> Result<(), AppError> {
        let value = metadata.to_value()?;
        self.data.insert(EXECUTION_KEY.to_string(), value);
        Ok(())
    }

    pub fn node_status(&self, node_id: &str) -> Result<NodeStatus, AppError> {
        Ok(self.execution()?.status(node_id))
    }

    pub fn failed_node(&self) -> Result<Option<String>, AppError> {
        Ok(self.execution()?.failed_node)
    }

    /// Reset the failure marker so a repaired run starts clean.
    pub fn clear_failure(&mut self) -> Result<(), AppError> {
        let mut metadata = self.execution()?;
        metadata.failed_node = None;
        self.set_execution(&metadata)
    }

    pub fn record_template_error(&mut self, record: TemplateErrorRecord) {
        let entry = serde_json::json!({
            "node_id": record.node_id,
            "param": record.param,
            "message": record.message,
        });
        let bucket = self
            .data
            .entry(TEMPLATE_ERRORS_KEY.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match bucket {
            Value::Array(items) => items.push(entry),
            other => *other = Value::Array(vec![entry]),
        }
    }

    pub fn template_errors(&self) -> Vec<TemplateErrorRecord> {
        match self.data.get(TEMPLATE_ERRORS_KEY) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}
