use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const GREETING_WORKFLOW: &str = r#"{
  "ir_version": "0.1.0",
  "inputs": {"name": {"description": "Who to greet"}},
  "nodes": [
    {"id": "greet", "type": "echo", "params": {"message": "hello ${name}"}}
  ],
  "outputs": {"greeting": {"source": "greet.echo"}}
}"#;

fn pflow(workspace: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pflow").unwrap();
    cmd.current_dir(workspace).env("PFLOW_LOG", "error");
    cmd
}

fn workspace_with_workflow() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("greet.json"), GREETING_WORKFLOW).unwrap();
    dir
}

#[test]
fn test_help_lists_workflow_commands() {
    let dir = TempDir::new().unwrap();
    pflow(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("WORKFLOW COMMANDS"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_validate_reports_missing_input() {
    let dir = workspace_with_workflow();
    pflow(dir.path())
        .args(["validate", "greet.json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "Required input '${name}' not provided - Who to greet (required)",
        ))
        .stderr(predicate::str::contains("failed template validation"));
}

#[test]
fn test_validate_accepts_supplied_param() {
    let dir = workspace_with_workflow();
    pflow(dir.path())
        .args(["validate", "greet.json", "--param", "name=octo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_run_prints_outputs_and_saves_run() {
    let dir = workspace_with_workflow();
    pflow(dir.path())
        .args(["run", "greet.json", "--param", "name=octo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"greeting\": \"hello octo\""));

    let runs = dir.path().join(".pflow/state/runs");
    let saved: Vec<_> = fs::read_dir(&runs).unwrap().flatten().collect();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].path().join("run.json").exists());
    assert!(saved[0].path().join("shared.json").exists());

    pflow(dir.path())
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed"));
}

#[test]
fn test_run_rejects_malformed_param() {
    let dir = workspace_with_workflow();
    pflow(dir.path())
        .args(["run", "greet.json", "--param", "name"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected KEY=VALUE"));
}
