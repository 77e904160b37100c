#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::template::{
    diagnose_malformed_json, has_templates, looks_like_json, parse_lenient, resolution_context,
    resolve_nested, template_paths, template_sites, variable_exists, Context,
};
use crate::core::types::{ErrorCategory, ResolutionMode};
use crate::core::workflow_graph::node::{GraphNode, NodeContext};
use crate::core::workflow_graph::shared_store::{SharedStore, TemplateErrorRecord};
use crate::core::workflow_graph::type_checker::normalize_type;
use async_trait::async_trait;
use indexmap::IndexMap;
use pflow_types::NodeMetadata;
use serde_json::{Map, Value};

/// Whether a parameter can contain templates, decided once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Static,
    Template,
}

impl ParamKind {
    pub fn of(value: &Value) -> Self {
        if has_templates(value) {
            ParamKind::Template
        } else {
            ParamKind::Static
        }
    }
}

#[derive(Debug, Clone)]
struct ClassifiedParam {
    value: Value,
    kind: ParamKind,
    /// Declared `dict` or `list` type, when JSON text must be coerced.
    container: Option<String>,
}

/// Resolves a node's templated params against the live store before each run.
pub struct TemplateAwareNode {
    inner: Box<dyn GraphNode>,
    node_id: String,
    params: IndexMap<String, ClassifiedParam>,
    initial_params: Map<String, Value>,
    mode: ResolutionMode,
}

impl TemplateAwareNode {
    pub fn new(
        inner: Box<dyn GraphNode>,
        node_id: impl Into<String>,
        params: &Map<String, Value>,
        initial_params: Map<String, Value>,
        metadata: Option<&NodeMetadata>,
        mode: ResolutionMode,
    ) -> Self {
        let params = params
            .iter()
            .map(|(key, value)| {
                let container = metadata
                    .and_then(|meta| meta.param(key))
                    .map(|spec| normalize_type(&spec.param_type))
                    .filter(|ty| ty == "dict" || ty == "list");
                (
                    key.clone(),
                    ClassifiedParam {
                        value: value.clone(),
                        kind: ParamKind::of(value),
                        container,
                    },
                )
            })
            .collect();
        Self {
            inner,
            node_id: node_id.into(),
            params,
            initial_params,
            mode,
        }
    }

    pub fn param_kind(&self, key: &str) -> Option<ParamKind> {
        self.params.get(key).map(|param| param.kind)
    }

    /// Keys of params that contain templates.
    pub fn template_params(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(_, param)| param.kind == ParamKind::Template)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    fn context(&self, shared: &SharedStore) -> Context {
        resolution_context(shared.data(), &self.initial_params)
    }

    fn resolve_all(&self, context: &Context) -> Map<String, Value> {
        self.params
            .iter()
            .map(|(key, param)| {
                let value = match param.kind {
                    ParamKind::Static => param.value.clone(),
                    ParamKind::Template => resolve_nested(&param.value, context),
                };
                (key.clone(), value)
            })
            .collect()
    }

    /// Resolve, then enforce that nothing stayed unresolved and that JSON
    /// text for container params parses.
    fn resolve_checked(&self, shared: &mut SharedStore) -> Result<Map<String, Value>, AppError> {
        let context = self.context(shared);
        let mut resolved = self.resolve_all(&context);

        for (key, param) in &self.params {
            if param.kind == ParamKind::Static {
                continue;
            }
            if let Some(error) = self.unresolved_error(key, &param.value, &context) {
                self.fail(shared, key, error)?;
            }
            let Some(expected) = &param.container else {
                continue;
            };
            let coerced = match resolved.get(key) {
                Some(Value::String(text)) if looks_like_json(text) => Some(
                    parse_lenient(text).ok_or_else(|| self.malformed_json_error(key, expected, text)),
                ),
                _ => None,
            };
            match coerced {
                Some(Ok(parsed)) => {
                    resolved.insert(key.clone(), parsed);
                }
                Some(Err(error)) => self.fail(shared, key, error)?,
                None => {}
            }
        }
        Ok(resolved)
    }

    fn unresolved_error(&self, key: &str, original: &Value, context: &Context) -> Option<AppError> {
        let mut missing: Vec<String> = Vec::new();
        let mut single = Map::new();
        single.insert(key.to_string(), original.clone());
        for site in template_sites(&single) {
            for path in template_paths(site.text) {
                if !variable_exists(path, context) && !missing.iter().any(|m| m == path) {
                    missing.push(path.to_string());
                }
            }
        }
        if missing.is_empty() {
            return None;
        }

        let mut available: Vec<&str> = context
            .keys()
            .filter(|k| !SharedStore::is_reserved(k))
            .map(String::as_str)
            .collect();
        available.sort();
        let rendered: Vec<String> = missing.iter().map(|path| format!("${{{}}}", path)).collect();
        let mut error = AppError::new(
            ErrorCategory::TemplateError,
            format!(
                "Unresolved variables in param '{}' of node '{}': {}",
                key,
                self.node_id,
                rendered.join(", ")
            ),
        )
        .with_code("PFL-TPL-001")
        .with_suggestion(format!(
            "available top-level keys: {}",
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        ));
        error.add_context("node_id", &self.node_id);
        error.add_context("param", key);
        Some(error)
    }

    fn malformed_json_error(&self, key: &str, expected: &str, text: &str) -> AppError {
        let diagnosis = diagnose_malformed_json(text);
        let preview: String = text.chars().take(200).collect();
        let mut error = AppError::new(
            ErrorCategory::TemplateError,
            format!(
                "Param '{}' of node '{}' expects {} but received malformed JSON: {} (value: {})",
                key, self.node_id, expected, diagnosis.hint, preview
            ),
        )
        .with_code("PFL-TPL-002")
        .with_suggestion(diagnosis.suggestion);
        error.add_context("node_id", &self.node_id);
        error.add_context("param", key);
        error
    }

    fn fail(&self, shared: &mut SharedStore, key: &str, error: AppError) -> Result<(), AppError> {
        match self.mode {
            ResolutionMode::Strict => Err(error),
            ResolutionMode::Permissive => {
                tracing::warn!(
                    node_id = %self.node_id,
                    param = key,
                    code = %error.code,
                    "continuing with unresolved template: {}",
                    error.message
                );
                shared.record_template_error(TemplateErrorRecord {
                    node_id: self.node_id.clone(),
                    param: key.to_string(),
                    message: error.message,
                });
                Ok(())
            }
        }
    }
}

#[async_trait]
impl GraphNode for TemplateAwareNode {
    async fn run(&self, ctx: &NodeContext, shared: &mut SharedStore) -> Result<String, AppError> {
        let resolved = self.resolve_checked(shared)?;
        tracing::debug!(
            node_id = %self.node_id,
            templates = self.template_params().len(),
            "resolved node params"
        );
        self.inner.run(&ctx.with_params(resolved), shared).await
    }

    fn effective_params(&self, _ctx: &NodeContext, shared: &SharedStore) -> Map<String, Value> {
        self.resolve_all(&self.context(shared))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::workflow_graph::node::{default_action, Node};
    use pflow_types::ParamSpec;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Records the params it was run with.
    struct Capture {
        seen: Arc<Mutex<Option<Map<String, Value>>>>,
    }

    #[async_trait]
    impl Node for Capture {
        async fn exec(&self, ctx: &NodeContext, _prep: Value) -> Result<Value, AppError> {
            *self.seen.lock().unwrap() = Some(ctx.params.clone());
            Ok(Value::Null)
        }

        fn post(&self, _: &NodeContext, _: &mut SharedStore, _: &Value, _: Value) -> Result<String, AppError> {
            Ok(default_action())
        }
    }

    fn wrap(params: Value, initial: Value, mode: ResolutionMode) -> (TemplateAwareNode, Arc<Mutex<Option<Map<String, Value>>>>, NodeContext) {
        let seen = Arc::new(Mutex::new(None));
        let params = params.as_object().cloned().unwrap();
        let metadata = NodeMetadata {
            params: vec![ParamSpec::new("body", "dict"), ParamSpec::new("items", "list")],
            ..NodeMetadata::default()
        };
        let node = TemplateAwareNode::new(
            Box::new(Capture { seen: seen.clone() }),
            "n",
            &params,
            initial.as_object().cloned().unwrap(),
            Some(&metadata),
            mode,
        );
        let ctx = NodeContext::new("n", "capture", params);
        (node, seen, ctx)
    }

    #[test]
    fn classifies_nested_templates() {
        let (node, _, _) = wrap(
            json!({"url": "https://x", "headers": {"Authorization": "Bearer ${token}"}}),
            json!({}),
            ResolutionMode::Strict,
        );
        assert_eq!(node.param_kind("url"), Some(ParamKind::Static));
        assert_eq!(node.param_kind("headers"), Some(ParamKind::Template));
    }

    #[tokio::test]
    async fn initial_params_win_over_shared_store() {
        let (node, seen, ctx) = wrap(json!({"msg": "${name}"}), json!({"name": "plan"}), ResolutionMode::Strict);
        let mut shared = SharedStore::new();
        shared.insert("name", json!("store"));
        node.run(&ctx, &mut shared).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_ref().unwrap()["msg"], json!("plan"));
    }

    #[tokio::test]
    async fn unresolved_template_fails_in_strict_mode() {
        let (node, seen, ctx) = wrap(json!({"msg": "hi ${missing.value}"}), json!({}), ResolutionMode::Strict);
        let mut shared = SharedStore::new();
        let err = node.run(&ctx, &mut shared).await.unwrap_err();
        assert_eq!(err.code, "PFL-TPL-001");
        assert!(err.message.contains("${missing.value}"));
        assert!(seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn container_params_are_coerced_from_json_text() {
        let (node, seen, ctx) = wrap(json!({"body": "${src.out}"}), json!({}), ResolutionMode::Strict);
        let mut shared = SharedStore::new();
        shared.insert("src", json!({"out": " {\"a\": [1]} "}));
        node.run(&ctx, &mut shared).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_ref().unwrap()["body"], json!({"a": [1]}));
    }

    #[tokio::test]
    async fn malformed_json_is_diagnosed() {
        let (node, _, ctx) = wrap(json!({"items": "${src.out}"}), json!({}), ResolutionMode::Strict);
        let mut shared = SharedStore::new();
        shared.insert("src", json!({"out": "[1, 2,]"}));
        let err = node.run(&ctx, &mut shared).await.unwrap_err();
        assert_eq!(err.code, "PFL-TPL-002");
        assert!(err.message.contains("trailing comma"));
    }

    #[tokio::test]
    async fn permissive_mode_records_and_continues() {
        let (node, seen, ctx) = wrap(
            json!({"msg": "${missing}", "body": "${src.out}"}),
            json!({}),
            ResolutionMode::Permissive,
        );
        let mut shared = SharedStore::new();
        shared.insert("src", json!({"out": "{'a': 1}"}));
        node.run(&ctx, &mut shared).await.unwrap();

        let params = seen.lock().unwrap().clone().unwrap();
        assert_eq!(params["msg"], json!("${missing}"));
        assert_eq!(params["body"], json!("{'a': 1}"));
        let errors = shared.template_errors();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.param == "body" && e.message.contains("single quotes")));
    }
}
