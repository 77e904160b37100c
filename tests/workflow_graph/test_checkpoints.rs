use async_trait::async_trait;
use pflow::core::error::AppError;
use pflow::core::types::{ErrorCategory, RunStatus};
use pflow::core::workflow_graph::{
    compile_ir_to_flow, load_run, save_run, workflow_hash, CompileOptions, CompiledWorkflow, Node,
    NodeContext, NodeRegistry, NodeStatus, ProgressEvent, ProgressKind, RunRecord, SharedStore,
};
use pflow_types::{NodeMetadata, OutputField, ParamSpec, WorkflowIr};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Counts how often its side effect actually happens.
struct SideEffect {
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl Node for SideEffect {
    async fn exec(&self, ctx: &NodeContext, _prep: Value) -> Result<Value, AppError> {
        let count = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({"count": count, "label": ctx.param("label").cloned().unwrap_or(Value::Null)}))
    }

    fn post(&self, ctx: &NodeContext, shared: &mut SharedStore, _prep: &Value, exec: Value) -> Result<String, AppError> {
        ctx.write_output(shared, "result", exec);
        Ok("default".to_string())
    }
}

/// Fails while `failing` is set.
struct Flaky {
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl Node for Flaky {
    async fn exec(&self, _ctx: &NodeContext, _prep: Value) -> Result<Value, AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::new(ErrorCategory::NodeExecutionError, "upstream unavailable"));
        }
        Ok(json!("ok"))
    }

    fn post(&self, ctx: &NodeContext, shared: &mut SharedStore, _prep: &Value, exec: Value) -> Result<String, AppError> {
        ctx.write_output(shared, "status", exec);
        Ok("default".to_string())
    }
}

struct Harness {
    registry: NodeRegistry,
    runs: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl Harness {
    fn new() -> Self {
        let runs = Arc::new(AtomicUsize::new(0));
        let failing = Arc::new(AtomicBool::new(false));
        let mut builder = NodeRegistry::builder();
        let effect_runs = runs.clone();
        let flaky_flag = failing.clone();
        builder
            .register(
                "side-effect",
                NodeMetadata {
                    params: vec![ParamSpec::new("label", "str")],
                    outputs: vec![OutputField::new("result", "dict")],
                    ..NodeMetadata::default()
                },
                move |_| Ok(Box::new(SideEffect { runs: effect_runs.clone() })),
            )
            .register(
                "flaky",
                NodeMetadata {
                    params: vec![ParamSpec::new("input", "any")],
                    outputs: vec![OutputField::new("status", "str")],
                    ..NodeMetadata::default()
                },
                move |_| Ok(Box::new(Flaky { failing: flaky_flag.clone() })),
            );
        Self {
            registry: builder.build(),
            runs,
            failing,
        }
    }

    fn compile(&self, ir: &WorkflowIr, params: Value) -> CompiledWorkflow {
        let initial_params: Map<String, Value> = params.as_object().cloned().unwrap_or_default();
        compile_ir_to_flow(
            ir,
            &self.registry,
            CompileOptions {
                initial_params,
                ..CompileOptions::default()
            },
        )
        .unwrap()
    }
}

fn workflow() -> WorkflowIr {
    serde_json::from_value(json!({
        "inputs": {"label": {"description": "Tag passed to the side effect"}},
        "nodes": [
            {"id": "effect", "type": "side-effect", "params": {"label": "${label}"}},
            {"id": "check", "type": "flaky", "params": {"input": "${effect.result.count}"}}
        ],
        "edges": [{"from": "effect", "to": "check"}]
    }))
    .unwrap()
}

fn recorder(shared: &mut SharedStore) -> Arc<Mutex<Vec<ProgressEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    shared.set_progress_callback(Arc::new(move |event: &ProgressEvent| {
        sink.lock().unwrap().push(event.clone());
    }));
    events
}

#[tokio::test]
async fn side_effect_runs_once_across_a_failed_and_a_resumed_run() {
    let harness = Harness::new();
    let ir = workflow();
    let compiled = harness.compile(&ir, json!({"label": "first"}));

    harness.failing.store(true, Ordering::SeqCst);
    let mut shared = SharedStore::new();
    let err = compiled.flow.run(&mut shared).await.unwrap_err();
    assert!(err.message.contains("upstream unavailable"));
    assert_eq!(shared.node_status("effect").unwrap(), NodeStatus::Completed);
    assert_eq!(shared.node_status("check").unwrap(), NodeStatus::Failed);
    assert_eq!(shared.failed_node().unwrap().as_deref(), Some("check"));

    harness.failing.store(false, Ordering::SeqCst);
    let events = recorder(&mut shared);
    compiled.flow.run(&mut shared).await.unwrap();

    assert_eq!(harness.runs.load(Ordering::SeqCst), 1);
    assert_eq!(shared.failed_node().unwrap(), None);
    assert_eq!(shared.get("check"), Some(&json!({"status": "ok"})));
    let kinds: Vec<(String, ProgressKind)> = events
        .lock()
        .unwrap()
        .iter()
        .map(|event| (event.node_id.clone(), event.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("effect".to_string(), ProgressKind::Start),
            ("effect".to_string(), ProgressKind::Cached),
            ("check".to_string(), ProgressKind::Start),
            ("check".to_string(), ProgressKind::Complete),
        ]
    );
}

#[tokio::test]
async fn saved_run_resumes_in_a_fresh_store() {
    let workspace = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let ir = workflow();

    harness.failing.store(true, Ordering::SeqCst);
    let mut shared = SharedStore::new();
    let compiled = harness.compile(&ir, json!({"label": "first"}));
    assert!(compiled.flow.run(&mut shared).await.is_err());

    let mut record = RunRecord::new(workflow_hash(&ir).unwrap());
    record.finish(RunStatus::Failed, shared.failed_node().unwrap());
    save_run(workspace.path(), &record, &shared).unwrap();

    let (loaded, mut restored) = load_run(workspace.path(), &record.run_id).unwrap();
    assert_eq!(loaded, record);
    assert_eq!(restored.data(), shared.data());
    assert_eq!(loaded.failed_node.as_deref(), Some("check"));

    harness.failing.store(false, Ordering::SeqCst);
    let recompiled = harness.compile(&ir, json!({"label": "first"}));
    recompiled.flow.run(&mut restored).await.unwrap();
    assert_eq!(harness.runs.load(Ordering::SeqCst), 1);
    assert_eq!(restored.node_status("check").unwrap(), NodeStatus::Completed);
}

#[tokio::test]
async fn changed_input_reruns_the_node_and_its_dependents() {
    let harness = Harness::new();
    let ir = workflow();
    let mut shared = SharedStore::new();

    harness
        .compile(&ir, json!({"label": "first"}))
        .flow
        .run(&mut shared)
        .await
        .unwrap();
    harness
        .compile(&ir, json!({"label": "first"}))
        .flow
        .run(&mut shared)
        .await
        .unwrap();
    assert_eq!(harness.runs.load(Ordering::SeqCst), 1);

    harness
        .compile(&ir, json!({"label": "second"}))
        .flow
        .run(&mut shared)
        .await
        .unwrap();
    assert_eq!(harness.runs.load(Ordering::SeqCst), 2);
    assert_eq!(
        shared.get("effect"),
        Some(&json!({"result": {"count": 2, "label": "second"}}))
    );
}
