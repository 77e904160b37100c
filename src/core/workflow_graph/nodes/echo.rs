#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::workflow_graph::node::{default_action, Node, NodeContext};
use crate::core::workflow_graph::shared_store::SharedStore;
use async_trait::async_trait;
use pflow_types::{NodeMetadata, OutputField, ParamSpec};
use serde_json::{json, Value};

pub const NODE_TYPE: &str = "echo";

pub fn metadata() -> NodeMetadata {
    NodeMetadata {
        description: "Copy params to outputs unchanged".to_string(),
        params: vec![
            ParamSpec::new("message", "any"),
            ParamSpec::new("data", "dict"),
            ParamSpec::new("action", "str").describe("Action to return, defaults to `default`"),
        ],
        inputs: Vec::new(),
        outputs: vec![OutputField::new("echo", "any"), OutputField::new("data", "dict")],
        actions: vec![default_action()],
    }
}

/// Writes `message` to `echo` and `data` to `data`, keeping their JSON types.
#[derive(Debug, Default)]
pub struct EchoNode;

#[async_trait]
impl Node for EchoNode {
    async fn exec(&self, ctx: &NodeContext, _prep: Value) -> Result<Value, AppError> {
        Ok(json!({
            "echo": ctx.param("message").cloned().unwrap_or(Value::Null),
            "data": ctx.param("data").cloned(),
        }))
    }

    fn post(
        &self,
        ctx: &NodeContext,
        shared: &mut SharedStore,
        _prep: &Value,
        exec: Value,
    ) -> Result<String, AppError> {
        if let Value::Object(mut outputs) = exec {
            if let Some(echo) = outputs.remove("echo") {
                ctx.write_output(shared, "echo", echo);
            }
            match outputs.remove("data") {
                Some(Value::Null) | None => {}
                Some(data) => ctx.write_output(shared, "data", data),
            }
        }
        Ok(ctx
            .str_param("action")
            .map(str::to_string)
            .unwrap_or_else(default_action))
    }
}
