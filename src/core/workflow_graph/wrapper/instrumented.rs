#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::workflow_graph::node::{GraphNode, NodeContext};
use crate::core::workflow_graph::shared_store::{ProgressKind, SharedStore};
use crate::core::workflow_graph::state::params_hash;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Instant;

/// Checkpoint layer: a node that already completed in this store with the
/// same type and effective params returns its recorded action without running.
pub struct InstrumentedNode {
    inner: Box<dyn GraphNode>,
}

impl InstrumentedNode {
    pub fn new(inner: Box<dyn GraphNode>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl GraphNode for InstrumentedNode {
    async fn run(&self, ctx: &NodeContext, shared: &mut SharedStore) -> Result<String, AppError> {
        let params = self.inner.effective_params(ctx, shared);
        let hash = params_hash(&ctx.node_type, &params);
        shared.emit(&ctx.node_id, ProgressKind::Start, None);

        if let Some(action) = shared.execution()?.cached_action(&ctx.node_id, &hash) {
            tracing::debug!(node_id = %ctx.node_id, action, "checkpoint hit, skipping node");
            shared.emit(&ctx.node_id, ProgressKind::Cached, None);
            return Ok(action.to_string());
        }

        tracing::info!(node_id = %ctx.node_id, node_type = %ctx.node_type, "running node");
        let started = Instant::now();
        let outcome = self.inner.run(ctx, shared).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut metadata = shared.execution()?;
        match outcome {
            Ok(action) => {
                metadata.mark_completed(&ctx.node_id, &action, &hash);
                shared.set_execution(&metadata)?;
                tracing::info!(node_id = %ctx.node_id, action = %action, duration_ms, "node completed");
                shared.emit(&ctx.node_id, ProgressKind::Complete, Some(duration_ms));
                Ok(action)
            }
            Err(error) => {
                metadata.mark_failed(&ctx.node_id);
                shared.set_execution(&metadata)?;
                tracing::warn!(node_id = %ctx.node_id, code = %error.code, duration_ms, "node failed");
                shared.emit(&ctx.node_id, ProgressKind::Failed, Some(duration_ms));
                Err(error)
            }
        }
    }

    fn effective_params(&self, ctx: &NodeContext, shared: &SharedStore) -> Map<String, Value> {
        self.inner.effective_params(ctx, shared)
    }
}
