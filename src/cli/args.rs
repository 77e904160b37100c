use clap::Args;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Args)]
pub struct ValidateArgs {
    /// Workflow IR file (.json, otherwise parsed as YAML)
    #[arg(value_name = "WORKFLOW")]
    pub workflow: PathBuf,

    /// Workflow input as KEY=VALUE; VALUE is parsed as JSON, else kept as a string
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Extra node metadata JSON merged over the built-in nodes
    #[arg(long, value_name = "FILE", help_heading = "Configuration")]
    pub registry: Option<PathBuf>,

    /// Workspace holding pflow.toml (default: current directory)
    #[arg(long, value_name = "DIR", help_heading = "Configuration")]
    pub workspace: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Workflow IR file (.json, otherwise parsed as YAML)
    #[arg(value_name = "WORKFLOW")]
    pub workflow: PathBuf,

    /// Workflow input as KEY=VALUE; VALUE is parsed as JSON, else kept as a string
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Record template failures in the shared store instead of aborting
    #[arg(long, help_heading = "Execution")]
    pub permissive: bool,

    /// Skip template validation before running
    #[arg(long, help_heading = "Execution")]
    pub no_validate: bool,

    /// Override execution.max_steps
    #[arg(long, value_name = "N", help_heading = "Execution")]
    pub max_steps: Option<usize>,

    /// Continue a saved run, reusing its completed nodes
    #[arg(long, value_name = "RUN_ID", help_heading = "Checkpoints")]
    pub resume: Option<Uuid>,

    /// Extra node metadata JSON merged over the built-in nodes
    #[arg(long, value_name = "FILE", help_heading = "Configuration")]
    pub registry: Option<PathBuf>,

    /// Workspace for pflow.toml, run state and logs (default: current directory)
    #[arg(long, value_name = "DIR", help_heading = "Configuration")]
    pub workspace: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunsArgs {
    /// Workspace whose saved runs are listed (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
}
