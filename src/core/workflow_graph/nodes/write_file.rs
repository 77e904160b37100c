#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::node::{default_action, Node, NodeContext};
use crate::core::workflow_graph::shared_store::SharedStore;
use async_trait::async_trait;
use pflow_types::{NodeMetadata, OutputField, ParamSpec};
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

pub const NODE_TYPE: &str = "write-file";

pub fn metadata() -> NodeMetadata {
    NodeMetadata {
        description: "Write content to a file".to_string(),
        params: vec![
            ParamSpec::new("file_path", "str").required(),
            ParamSpec::new("append", "bool"),
        ],
        inputs: vec![ParamSpec::new("content", "any")
            .required()
            .describe("Strings are written as-is, other values as pretty JSON")],
        outputs: vec![
            OutputField::new("written", "bool"),
            OutputField::new("file_path", "str"),
        ],
        actions: vec![default_action()],
    }
}

pub struct WriteFileNode {
    workspace_root: PathBuf,
}

impl WriteFileNode {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Node for WriteFileNode {
    async fn exec(&self, ctx: &NodeContext, _prep: Value) -> Result<Value, AppError> {
        let path = self.workspace_root.join(ctx.require_str("file_path")?);
        let content = match ctx.param("content") {
            Some(Value::String(text)) => text.clone(),
            Some(other) => serde_json::to_string_pretty(other)?,
            None => String::new(),
        };
        let append = ctx.param("append").and_then(Value::as_bool).unwrap_or(false);

        let io_error = |action: &str, err: std::io::Error| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to {} {}: {}", action, path.display(), err),
            )
            .with_code("PFL-NODE-004")
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| io_error("create parent directory of", err))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .await
            .map_err(|err| io_error("open", err))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|err| io_error("write", err))?;
        file.flush().await.map_err(|err| io_error("flush", err))?;

        tracing::debug!(node_id = %ctx.node_id, path = %path.display(), bytes = content.len(), "file written");
        Ok(json!({"written": true, "file_path": path.display().to_string()}))
    }

    fn post(
        &self,
        ctx: &NodeContext,
        shared: &mut SharedStore,
        _prep: &Value,
        exec: Value,
    ) -> Result<String, AppError> {
        for key in ["written", "file_path"] {
            ctx.write_output(shared, key, exec.get(key).cloned().unwrap_or(Value::Null));
        }
        Ok(default_action())
    }
}
