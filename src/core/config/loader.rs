#![allow(clippy::result_large_err)]

use super::PflowConfig;
use crate::core::error::AppError;
use crate::core::types::{ErrorCategory, ResolutionMode};
use std::env;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from workspace root (workspace/pflow.toml).
    /// A missing file yields defaults; environment variables override either.
    pub fn load_from_workspace(workspace_path: &Path) -> Result<PflowConfig, AppError> {
        let config_path = workspace_path.join("pflow.toml");
        let mut config = Self::load_from_file(&config_path)?.unwrap_or_default();

        Self::apply_env_overrides(&mut config);
        if let Some(path) = &config.registry.path {
            if path.is_relative() {
                config.registry.path = Some(workspace_path.join(path));
            }
        }
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load config from specific file path; Ok(None) if it doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<PflowConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: PflowConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    /// Environment variables take precedence over config file values.
    /// Unparseable values are ignored with a warning.
    fn apply_env_overrides(config: &mut PflowConfig) {
        if let Ok(mode) = env::var("PFLOW_RESOLUTION_MODE") {
            match mode.parse::<ResolutionMode>() {
                Ok(mode) => config.execution.resolution_mode = mode,
                Err(err) => tracing::warn!("ignoring PFLOW_RESOLUTION_MODE: {}", err),
            }
        }

        if let Ok(validate) = env::var("PFLOW_VALIDATE") {
            match validate.parse::<bool>() {
                Ok(validate) => config.execution.validate = validate,
                Err(_) => tracing::warn!("ignoring PFLOW_VALIDATE={}, expected true/false", validate),
            }
        }

        if let Ok(max_steps) = env::var("PFLOW_MAX_STEPS") {
            match max_steps.parse::<usize>() {
                Ok(max_steps) => config.execution.max_steps = max_steps,
                Err(_) => tracing::warn!("ignoring PFLOW_MAX_STEPS={}, expected an integer", max_steps),
            }
        }

        if let Ok(path) = env::var("PFLOW_REGISTRY_PATH") {
            if !path.trim().is_empty() {
                config.registry.path = Some(PathBuf::from(path));
            }
        }
    }

    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "PFLOW_RESOLUTION_MODE - Override template resolution mode (strict/permissive, default: strict)",
            "PFLOW_VALIDATE - Override template validation before run (true/false, default: true)",
            "PFLOW_MAX_STEPS - Override the node execution limit (default: 1000)",
            "PFLOW_REGISTRY_PATH - Extra node metadata JSON file",
            "PFLOW_LOG - Tracing filter directive (default: info)",
        ]
    }

    pub fn validate_config(config: &PflowConfig) -> Result<(), AppError> {
        if config.execution.max_steps == 0 {
            return Err(AppError::new(
                ErrorCategory::ConfigError,
                "execution.max_steps must be greater than zero".to_string(),
            ));
        }

        if let Some(path) = &config.registry.path {
            if path.as_os_str().is_empty() {
                return Err(AppError::new(
                    ErrorCategory::ConfigError,
                    "registry.path cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
