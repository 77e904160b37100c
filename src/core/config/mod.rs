pub mod loader;

pub use loader::ConfigLoader;

use crate::core::types::ResolutionMode;
use crate::core::workflow_graph::flow::DEFAULT_MAX_STEPS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main pflow configuration loaded from pflow.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PflowConfig {
    /// Runtime behaviour of compiled workflows
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Node metadata sources
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// What the template wrapper does with unresolved templates
    #[serde(default)]
    pub resolution_mode: ResolutionMode,

    /// Refuse to run workflows with template validation errors
    #[serde(default = "default_true")]
    pub validate: bool,

    /// Upper bound on node executions per run
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Persist run state under .pflow/state/runs
    #[serde(default = "default_true")]
    pub checkpoint: bool,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    /// JSON file with extra node metadata, merged over the built-ins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            resolution_mode: ResolutionMode::Strict,
            validate: default_true(),
            max_steps: default_max_steps(),
            checkpoint: default_true(),
        }
    }
}
