pub mod args;
pub mod commands;

pub use args::{RunArgs, RunsArgs, ValidateArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
WORKFLOW COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "pflow")]
#[command(version = crate::VERSION)]
#[command(about = "Validate and run pflow workflow IR")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: validate a workflow, run it, and resume from the saved run if a node fails."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Check template references without executing",
        long_about = "Validate resolves every ${...} reference statically against workflow inputs, node outputs and execution order, and reports errors and warnings.",
        after_help = "Example:\n    pflow validate workflow.json --param repo=octo/hello"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Execute a workflow",
        long_about = "Run compiles the workflow, executes nodes in flow order with checkpointing, saves the run under .pflow/state/runs and prints declared outputs as JSON.",
        after_help = "Examples:\n    pflow run workflow.yaml --param repo=octo/hello\n    pflow run workflow.yaml --resume 6f1c0d2e-0d4b-4c55-9a3e-2b0f4a1d7c11"
    )]
    Run(RunArgs),
    #[command(
        about = "List saved runs",
        after_help = "Example:\n    pflow runs --workspace ."
    )]
    Runs(RunsArgs),
}

impl Command {
    /// Workspace the command operates in, if one was given explicitly.
    pub fn workspace(&self) -> Option<PathBuf> {
        match self {
            Command::Validate(args) => args.workspace.clone(),
            Command::Run(args) => args.workspace.clone(),
            Command::Runs(args) => args.workspace.clone(),
        }
    }

    /// Whether stdout carries command output that logs must not interleave with.
    pub fn reserves_stdout(&self) -> bool {
        matches!(self, Command::Run(_))
    }
}

pub async fn run(args: Args) -> crate::Result<()> {
    match args.command {
        Command::Validate(validate_args) => commands::validate(validate_args).await,
        Command::Run(run_args) => commands::run(run_args).await,
        Command::Runs(runs_args) => commands::runs(runs_args).await,
    }
}
