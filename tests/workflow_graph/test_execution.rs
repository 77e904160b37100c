use async_trait::async_trait;
use pflow::core::error::AppError;
use pflow::core::types::ResolutionMode;
use pflow::core::workflow_graph::nodes::shell::{CommandOutput, CommandRequest, CommandRunner};
use pflow::core::workflow_graph::nodes::{register_builtins_with_deps, BuiltinNodeDeps};
use pflow::core::workflow_graph::{compile_ir_to_flow, CompileOptions, NodeRegistry, SharedStore};
use pflow_types::WorkflowIr;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Answers known commands with canned output and records every request.
#[derive(Default)]
struct Scripted {
    responses: HashMap<String, CommandOutput>,
    seen: Mutex<Vec<String>>,
}

impl Scripted {
    fn respond(mut self, command: &str, stdout: &str, exit_code: i32) -> Self {
        self.responses.insert(
            command.to_string(),
            CommandOutput {
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
                exit_code,
            },
        );
        self
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for Scripted {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, AppError> {
        self.seen.lock().unwrap().push(request.command.clone());
        Ok(self
            .responses
            .get(&request.command)
            .cloned()
            .unwrap_or_default())
    }
}

fn registry(workspace: &Path, runner: Arc<Scripted>) -> NodeRegistry {
    let mut builder = NodeRegistry::builder();
    register_builtins_with_deps(
        &mut builder,
        workspace.to_path_buf(),
        BuiltinNodeDeps {
            command_runner: Some(runner),
        },
    );
    builder.build()
}

fn ir(value: Value) -> WorkflowIr {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn json_stdout_feeds_a_later_command() {
    let runner = Arc::new(Scripted::default().respond("produce", "{\"items\":[1,2,3]}", 0));
    let workflow = ir(json!({
        "nodes": [
            {"id": "first", "type": "shell", "params": {"command": "produce"}},
            {"id": "second", "type": "shell", "params": {"command": "echo ${first.stdout.items[0]}"}}
        ],
        "edges": [{"from": "first", "to": "second"}],
        "outputs": {"count": {"source": "${first.stdout.items[2]}"}}
    }));
    let compiled = compile_ir_to_flow(
        &workflow,
        &registry(Path::new("."), runner.clone()),
        CompileOptions::default(),
    )
    .unwrap();

    let mut shared = SharedStore::new();
    let outcome = compiled.flow.run(&mut shared).await.unwrap();

    assert_eq!(outcome.visited, vec!["first", "second"]);
    assert_eq!(runner.seen(), vec!["produce", "echo 1"]);
    assert_eq!(compiled.flow.collect_outputs(&shared)["count"], json!(3));
}

#[tokio::test]
async fn error_action_routes_to_the_handler() {
    let runner = Arc::new(Scripted::default().respond("deploy", "", 1));
    let workflow = ir(json!({
        "nodes": [
            {"id": "deploy", "type": "shell", "params": {"command": "deploy"}},
            {"id": "done", "type": "echo", "params": {"message": "deployed"}},
            {"id": "rollback", "type": "echo", "params": {"message": "exit ${deploy.exit_code}"}}
        ],
        "edges": [
            {"from": "deploy", "to": "done"},
            {"from": "deploy", "to": "rollback", "action": "error"}
        ],
        "outputs": {"report": {"source": "rollback.echo"}}
    }));
    let compiled = compile_ir_to_flow(
        &workflow,
        &registry(Path::new("."), runner),
        CompileOptions::default(),
    )
    .unwrap();

    let mut shared = SharedStore::new();
    let outcome = compiled.flow.run(&mut shared).await.unwrap();

    assert_eq!(outcome.visited, vec!["deploy", "rollback"]);
    assert!(shared.get("done").is_none());
    assert_eq!(
        compiled.flow.collect_outputs(&shared)["report"],
        json!("exit 1")
    );
}

#[tokio::test]
async fn files_written_by_one_node_are_read_by_the_next() {
    let workspace = tempfile::tempdir().unwrap();
    let mut params = Map::new();
    params.insert("name".to_string(), json!("notes.txt"));
    params.insert("body".to_string(), json!({"lines": ["a", "b"]}));
    let workflow = ir(json!({
        "inputs": {"name": {}, "body": {}},
        "nodes": [
            {"id": "save", "type": "write-file", "params": {"file_path": "${name}", "content": "${body}"}},
            {"id": "load", "type": "read-file", "params": {"file_path": "${save.file_path}"}}
        ],
        "edges": [{"from": "save", "to": "load"}],
        "outputs": {"lines": {"source": "load.content.lines"}}
    }));
    let compiled = compile_ir_to_flow(
        &workflow,
        &registry(workspace.path(), Arc::new(Scripted::default())),
        CompileOptions {
            initial_params: params,
            ..CompileOptions::default()
        },
    )
    .unwrap();

    let mut shared = SharedStore::new();
    compiled.flow.run(&mut shared).await.unwrap();

    assert!(workspace.path().join("notes.txt").exists());
    assert_eq!(
        compiled.flow.collect_outputs(&shared)["lines"],
        json!(["a", "b"])
    );
}

#[tokio::test]
async fn workflow_inputs_are_available_as_outputs() {
    let workflow = ir(json!({
        "inputs": {"repo": {"description": "Repository"}},
        "nodes": [{"id": "note", "type": "echo", "params": {"message": "checking ${repo}"}}],
        "outputs": {"repo_out": {"source": "${repo}"}, "note": {"source": "note.echo"}}
    }));
    let mut params = Map::new();
    params.insert("repo".to_string(), json!("octo/hello"));
    let compiled = compile_ir_to_flow(
        &workflow,
        &registry(Path::new("."), Arc::new(Scripted::default())),
        CompileOptions {
            initial_params: params,
            ..CompileOptions::default()
        },
    )
    .unwrap();
    assert!(compiled.report.is_clean());

    let mut shared = SharedStore::new();
    compiled.flow.run(&mut shared).await.unwrap();

    assert_eq!(shared.get("repo"), Some(&json!("octo/hello")));
    let outputs = compiled.flow.collect_outputs(&shared);
    assert_eq!(outputs["repo_out"], json!("octo/hello"));
    assert_eq!(outputs["note"], json!("checking octo/hello"));
}

#[tokio::test]
async fn unresolved_template_fails_in_strict_mode_and_is_recorded_in_permissive_mode() {
    let workflow = ir(json!({
        "nodes": [
            {"id": "greet", "type": "echo", "params": {"message": "hello ${missing.name}"}},
            {"id": "after", "type": "echo", "params": {"message": "still running"}}
        ],
        "edges": [{"from": "greet", "to": "after"}]
    }));
    let registry = registry(Path::new("."), Arc::new(Scripted::default()));

    let strict = compile_ir_to_flow(
        &workflow,
        &registry,
        CompileOptions {
            validate: false,
            ..CompileOptions::default()
        },
    )
    .unwrap();
    let err = strict.flow.run(&mut SharedStore::new()).await.unwrap_err();
    assert_eq!(err.code, "PFL-TPL-001");
    assert!(err.message.contains("${missing.name}"));

    let permissive = compile_ir_to_flow(
        &workflow,
        &registry,
        CompileOptions {
            validate: false,
            resolution_mode: ResolutionMode::Permissive,
            ..CompileOptions::default()
        },
    )
    .unwrap();
    let mut shared = SharedStore::new();
    let outcome = permissive.flow.run(&mut shared).await.unwrap();

    assert_eq!(outcome.visited, vec!["greet", "after"]);
    assert_eq!(shared.get("greet"), Some(&json!({"echo": "hello ${missing.name}"})));
    let recorded = shared.template_errors();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].node_id, "greet");
    assert_eq!(recorded[0].param, "message");
}
