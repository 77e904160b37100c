pub mod echo;
pub mod read_file;
pub mod shell;
pub mod write_file;

use crate::core::workflow_graph::node::{GraphNode, NodeRegistry, NodeRegistryBuilder};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Default)]
pub struct BuiltinNodeDeps {
    pub command_runner: Option<Arc<dyn shell::CommandRunner>>,
}

/// Register built-in nodes into the supplied builder.
pub fn register_builtins(builder: &mut NodeRegistryBuilder, workspace: PathBuf) {
    register_builtins_with_deps(builder, workspace, BuiltinNodeDeps::default());
}

pub fn register_builtins_with_deps(
    builder: &mut NodeRegistryBuilder,
    workspace: PathBuf,
    deps: BuiltinNodeDeps,
) {
    let runner: Arc<dyn shell::CommandRunner> = deps
        .command_runner
        .unwrap_or_else(|| Arc::new(shell::TokioCommandRunner));
    let shell_workspace = workspace.clone();
    let write_workspace = workspace.clone();
    let read_workspace = workspace;

    builder
        .register(shell::NODE_TYPE, shell::metadata(), move |_| {
            let node: Box<dyn GraphNode> = Box::new(shell::ShellNode::with_runner(
                shell_workspace.clone(),
                runner.clone(),
            ));
            Ok(node)
        })
        .register(echo::NODE_TYPE, echo::metadata(), |_| Ok(Box::new(echo::EchoNode)))
        .register(write_file::NODE_TYPE, write_file::metadata(), move |_| {
            Ok(Box::new(write_file::WriteFileNode::new(write_workspace.clone())))
        })
        .register(read_file::NODE_TYPE, read_file::metadata(), move |_| {
            Ok(Box::new(read_file::ReadFileNode::new(read_workspace.clone())))
        });
}

/// Registry holding only the built-in nodes.
pub fn builtin_registry(workspace: PathBuf) -> NodeRegistry {
    let mut builder = NodeRegistry::builder();
    register_builtins(&mut builder, workspace);
    builder.build()
}
