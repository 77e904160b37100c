#![allow(clippy::result_large_err)] // Shell node returns AppError to surface process diagnostics without boxing.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::node::{default_action, Node, NodeContext};
use crate::core::workflow_graph::shared_store::SharedStore;
use async_trait::async_trait;
use pflow_types::{NodeMetadata, OutputField, ParamSpec};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const NODE_TYPE: &str = "shell";
pub const ERROR_ACTION: &str = "error";
const OUTPUT_CAPTURE_LIMIT_BYTES: usize = 1_048_576;

pub fn metadata() -> NodeMetadata {
    NodeMetadata {
        description: "Run a command through the system shell".to_string(),
        params: vec![
            ParamSpec::new("command", "str")
                .required()
                .describe("Command line passed to `sh -c`"),
            ParamSpec::new("cwd", "str").describe("Working directory, relative to the workspace"),
            ParamSpec::new("env", "dict").describe("Extra environment variables"),
            ParamSpec::new("timeout", "int").describe("Seconds before the command is killed"),
            ParamSpec::new("ignore_errors", "bool")
                .describe("Return the default action even on a non-zero exit"),
        ],
        inputs: vec![ParamSpec::new("stdin", "any").describe("Data written to the command's stdin")],
        outputs: vec![
            OutputField::new("stdout", "str"),
            OutputField::new("stderr", "str"),
            OutputField::new("exit_code", "int"),
        ],
        actions: vec![default_action(), ERROR_ACTION.to_string()],
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandRequest {
    pub command: String,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, AppError>;
}

pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, AppError> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&request.command)
            .current_dir(&request.cwd)
            .envs(&request.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|err| {
            AppError::new(
                ErrorCategory::NodeExecutionError,
                format!("failed to spawn command: {}", err),
            )
            .with_code("PFL-NODE-002")
        })?;

        // Stdin is written concurrently with draining stdout and stderr.
        let writer = match (request.stdin.clone(), child.stdin.take()) {
            (Some(input), Some(mut stdin)) => Some(tokio::spawn(async move {
                stdin.write_all(input.as_bytes()).await?;
                stdin.shutdown().await?;
                Ok::<_, std::io::Error>(())
            })),
            _ => None,
        };

        let wait = child.wait_with_output();
        let output = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                AppError::new(
                    ErrorCategory::TimeoutError,
                    format!("command timed out after {}s", limit.as_secs()),
                )
                .with_code("PFL-NODE-003")
            })?,
            None => wait.await,
        }
        .map_err(|err| {
            AppError::new(
                ErrorCategory::NodeExecutionError,
                format!("failed to execute command: {}", err),
            )
            .with_code("PFL-NODE-002")
        })?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Err(err)) if err.kind() != ErrorKind::BrokenPipe => {
                    return Err(AppError::new(
                        ErrorCategory::IoError,
                        format!("failed to write command stdin: {}", err),
                    )
                    .with_code("PFL-NODE-002"));
                }
                Err(err) => {
                    return Err(AppError::new(
                        ErrorCategory::InternalError,
                        format!("stdin writer task failed: {}", err),
                    )
                    .with_code("PFL-NODE-002"));
                }
                _ => {}
            }
        }

        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

pub struct ShellNode {
    workspace_root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl ShellNode {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            runner: Arc::new(TokioCommandRunner),
        }
    }

    pub fn with_runner(workspace_root: PathBuf, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            workspace_root,
            runner,
        }
    }

    fn request(&self, ctx: &NodeContext) -> Result<CommandRequest, AppError> {
        let command = ctx.require_str("command")?.trim().to_string();
        if command.is_empty() {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                format!("node '{}' has an empty command", ctx.node_id),
            )
            .with_code("PFL-NODE-001"));
        }

        let cwd = ctx
            .str_param("cwd")
            .map(|cwd| self.workspace_root.join(cwd))
            .unwrap_or_else(|| self.workspace_root.clone());

        let env = ctx
            .param("env")
            .and_then(Value::as_object)
            .map(|vars| {
                vars.iter()
                    .map(|(key, value)| {
                        let value = match value {
                            Value::String(text) => text.clone(),
                            other => other.to_string(),
                        };
                        (key.clone(), value)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let stdin = match ctx.param("stdin") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
        };

        let timeout = ctx
            .param("timeout")
            .and_then(Value::as_u64)
            .map(Duration::from_secs);

        Ok(CommandRequest {
            command,
            cwd,
            env,
            stdin,
            timeout,
        })
    }
}

#[async_trait]
impl Node for ShellNode {
    async fn exec(&self, ctx: &NodeContext, _prep: Value) -> Result<Value, AppError> {
        let request = self.request(ctx)?;
        tracing::debug!(
            node_id = %ctx.node_id,
            command = %request.command,
            cwd = %request.cwd.display(),
            "executing shell command"
        );
        let output = self.runner.run(&request).await?;
        Ok(json!({
            "stdout": limit_bytes(&output.stdout),
            "stderr": limit_bytes(&output.stderr),
            "exit_code": output.exit_code,
        }))
    }

    fn post(
        &self,
        ctx: &NodeContext,
        shared: &mut SharedStore,
        _prep: &Value,
        exec: Value,
    ) -> Result<String, AppError> {
        let exit_code = exec.get("exit_code").and_then(Value::as_i64).unwrap_or(-1);
        for key in ["stdout", "stderr", "exit_code"] {
            ctx.write_output(shared, key, exec.get(key).cloned().unwrap_or(Value::Null));
        }

        let ignore_errors = ctx
            .param("ignore_errors")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if exit_code != 0 && !ignore_errors {
            tracing::warn!(node_id = %ctx.node_id, exit_code, "command exited with non-zero status");
            return Ok(ERROR_ACTION.to_string());
        }
        Ok(default_action())
    }
}

fn limit_bytes(bytes: &[u8]) -> String {
    let limit = OUTPUT_CAPTURE_LIMIT_BYTES.min(bytes.len());
    String::from_utf8_lossy(&bytes[..limit]).into_owned()
}
