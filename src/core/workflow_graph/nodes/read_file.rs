#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::node::{default_action, Node, NodeContext};
use crate::core::workflow_graph::shared_store::SharedStore;
use async_trait::async_trait;
use pflow_types::{NodeMetadata, OutputField, ParamSpec};
use serde_json::Value;
use std::path::PathBuf;

pub const NODE_TYPE: &str = "read-file";

pub fn metadata() -> NodeMetadata {
    NodeMetadata {
        description: "Read a UTF-8 file".to_string(),
        params: vec![ParamSpec::new("file_path", "str").required()],
        inputs: Vec::new(),
        outputs: vec![OutputField::new("content", "str")],
        actions: vec![default_action()],
    }
}

pub struct ReadFileNode {
    workspace_root: PathBuf,
}

impl ReadFileNode {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Node for ReadFileNode {
    async fn exec(&self, ctx: &NodeContext, _prep: Value) -> Result<Value, AppError> {
        let path = self.workspace_root.join(ctx.require_str("file_path")?);
        let content = tokio::fs::read_to_string(&path).await.map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read {}: {}", path.display(), err),
            )
            .with_code("PFL-NODE-004")
        })?;
        Ok(Value::String(content))
    }

    fn post(
        &self,
        ctx: &NodeContext,
        shared: &mut SharedStore,
        _prep: &Value,
        exec: Value,
    ) -> Result<String, AppError> {
        ctx.write_output(shared, "content", exec);
        Ok(default_action())
    }
}
