//! Workflow graph compilation, template validation and checkpointed execution.

pub mod checkpoint;
pub mod compiler;
pub mod flow;
pub mod node;
pub mod nodes;
pub mod schema;
pub mod shared_store;
pub mod state;
pub mod type_checker;
pub mod validator;
pub mod wrapper;

pub use checkpoint::{list_runs, load_run, save_run, workflow_hash, RunRecord, RunStatePaths};
pub use compiler::{compile_ir_to_flow, prepare_inputs, CompileOptions, CompiledWorkflow};
pub use flow::{Flow, FlowNode, FlowOutcome, DEFAULT_MAX_STEPS};
pub use node::{GraphNode, Node, NodeContext, NodeFactory, NodeRegistry, NodeRegistryBuilder};
pub use schema::{load_registry, load_workflow, parse_workflow};
pub use shared_store::{ProgressCallback, ProgressEvent, ProgressKind, SharedStore, TemplateErrorRecord};
pub use state::{params_hash, ExecutionMetadata, NodeStatus};
pub use validator::{validate_workflow_templates, Diagnostic, DiagnosticSeverity, ValidationReport};
