#![allow(clippy::result_large_err)] // Workflow loading APIs return AppError to preserve structured validation context without boxing.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use pflow_types::{Registry, WorkflowIr};
use std::fs;
use std::path::Path;

const SUPPORTED_IR_MAJOR: &str = "0";

fn read_text(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to read {}: {}", path.display(), err),
        )
    })
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Parse workflow IR from JSON or YAML text.
pub fn parse_workflow(text: &str, json: bool) -> Result<WorkflowIr, AppError> {
    let ir: WorkflowIr = if json {
        serde_json::from_str(text).map_err(|err| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("failed to parse workflow JSON: {}", err),
            )
            .with_code("PFL-CMP-002")
        })?
    } else {
        serde_yaml::from_str(text).map_err(|err| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("failed to parse workflow YAML: {}", err),
            )
            .with_code("PFL-CMP-002")
        })?
    };
    check_ir_version(&ir)?;
    Ok(ir)
}

fn check_ir_version(ir: &WorkflowIr) -> Result<(), AppError> {
    let major = ir.ir_version.split('.').next().unwrap_or_default();
    if major != SUPPORTED_IR_MAJOR {
        return Err(AppError::new(
            ErrorCategory::ValidationError,
            format!(
                "unsupported ir_version {}, expected {}.x",
                ir.ir_version, SUPPORTED_IR_MAJOR
            ),
        )
        .with_code("PFL-CMP-002"));
    }
    Ok(())
}

/// Load workflow IR; `.json` files are parsed as JSON, anything else as YAML.
pub fn load_workflow(path: &Path) -> Result<WorkflowIr, AppError> {
    let text = read_text(path)?;
    parse_workflow(&text, is_json(path)).map_err(|mut err| {
        err.add_context("file", &path.display().to_string());
        err
    })
}

/// Load node metadata declared outside the built-in set.
pub fn load_registry(path: &Path) -> Result<Registry, AppError> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|err| {
        AppError::new(
            ErrorCategory::ConfigError,
            format!("failed to parse registry {}: {}", path.display(), err),
        )
    })
}
