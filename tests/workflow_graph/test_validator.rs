use pflow::core::workflow_graph::nodes::builtin_registry;
use pflow::core::workflow_graph::validator::{ORDERING, TYPE_MISMATCH, NO_SOURCE};
use pflow::core::workflow_graph::{prepare_inputs, validate_workflow_templates, ValidationReport};
use pflow_types::WorkflowIr;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

fn validate(workflow: Value, params: Value) -> ValidationReport {
    let ir: WorkflowIr = serde_json::from_value(workflow).unwrap();
    let registry = builtin_registry(PathBuf::from("."));
    let params: Map<String, Value> = params.as_object().cloned().unwrap_or_default();
    let params = prepare_inputs(&ir, params);
    validate_workflow_templates(&ir, &params, registry.metadata())
}

#[test]
fn missing_required_input_is_reported_once() {
    let report = validate(
        json!({
            "inputs": {"repo": {"description": "Repository to inspect"}},
            "nodes": [
                {"id": "clone", "type": "shell", "params": {"command": "git clone ${repo}"}},
                {"id": "log", "type": "shell", "params": {"command": "git -C ${repo} log"}}
            ],
            "edges": [{"from": "clone", "to": "log"}]
        }),
        json!({}),
    );

    insta::assert_debug_snapshot!(report.errors(), @r###"
    [
        "Required input '${repo}' not provided - Repository to inspect (required)",
    ]
    "###);
    assert!(report.warnings().is_empty());
}

#[test]
fn supplied_input_and_defaults_validate_cleanly() {
    let workflow = json!({
        "inputs": {
            "repo": {"description": "Repository"},
            "branch": {"required": false, "default": "main"}
        },
        "nodes": [
            {"id": "clone", "type": "shell", "params": {"command": "git clone -b ${branch} ${repo}"}},
            {"id": "show", "type": "echo", "params": {"message": "${clone.stdout}"}}
        ],
        "edges": [{"from": "clone", "to": "show"}],
        "outputs": {"log": {"source": "show.echo"}}
    });

    assert!(validate(workflow, json!({"repo": "octo/hello"})).is_clean());
}

#[test]
fn reference_against_edge_direction_is_an_ordering_error() {
    let report = validate(
        json!({
            "nodes": [
                {"id": "a", "type": "echo", "params": {"message": "${b.echo}"}},
                {"id": "b", "type": "echo", "params": {"message": "hi"}}
            ],
            "edges": [{"from": "b", "to": "a"}]
        }),
        json!({}),
    );

    let codes: Vec<&str> = report.diagnostics().iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ORDERING]);
    assert!(!codes.contains(&NO_SOURCE));
    assert!(report.errors()[0].contains("'a' must execute after 'b'"));
}

#[test]
fn flat_mode_accepts_any_earlier_producer_of_a_shared_key() {
    let chain = |first: &str| {
        let params = if first == "shell" {
            json!({"command": "ls"})
        } else {
            json!({"message": "start"})
        };
        json!({
            "enable_namespacing": false,
            "nodes": [
                {"id": "a", "type": first, "params": params},
                {"id": "b", "type": "echo", "params": {"message": "${stdout}"}},
                {"id": "c", "type": "shell", "params": {"command": "wc -l"}}
            ],
            "edges": [{"from": "a", "to": "b"}, {"from": "b", "to": "c"}]
        })
    };

    let report = validate(chain("shell"), json!({}));
    assert!(report.errors().is_empty(), "{:?}", report.errors());

    let report = validate(chain("echo"), json!({}));
    let codes: Vec<&str> = report.diagnostics().iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ORDERING]);
    assert!(report.errors()[0].contains("'b' must execute after 'c'"));
}

#[test]
fn int_output_into_bool_param_is_a_type_mismatch() {
    let report = validate(
        json!({
            "nodes": [
                {"id": "run", "type": "shell", "params": {"command": "make"}},
                {"id": "save", "type": "write-file", "params": {
                    "file_path": "out.txt",
                    "content": "${run.stdout}",
                    "append": "${run.exit_code}"
                }}
            ],
            "edges": [{"from": "run", "to": "save"}]
        }),
        json!({}),
    );

    let mismatches: Vec<_> = report
        .diagnostics()
        .iter()
        .filter(|d| d.code == TYPE_MISMATCH)
        .collect();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].inferred_type.as_deref(), Some("int"));
    assert_eq!(mismatches[0].expected_type.as_deref(), Some("bool"));
    assert_eq!(mismatches[0].param_path.as_deref(), Some("append"));
    assert_eq!(report.errors().len(), 1);
}

#[test]
fn every_problem_is_collected_in_one_pass() {
    let report = validate(
        json!({
            "inputs": {"unused": {"required": false}},
            "nodes": [
                {"id": "a", "type": "echo", "params": {
                    "message": "${ghost} and ${a.echo}",
                    "data": {"broken": "${unclosed"}
                }}
            ],
            "outputs": {"result": {"source": "nowhere.value"}}
        }),
        json!({}),
    );

    let mut codes: Vec<&str> = report.sorted().iter().map(|d| d.code).collect();
    codes.dedup();
    assert_eq!(
        codes,
        vec!["TPL-VAL-001", "TPL-VAL-003", "TPL-VAL-004", "TPL-VAL-010", "TPL-VAL-008"]
    );
}
