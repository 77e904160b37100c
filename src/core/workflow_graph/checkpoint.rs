#![allow(clippy::result_large_err)] // Checkpoint module returns AppError to preserve structured diagnostic context; boxing would discard run-time state.

//! On-disk persistence of a run's shared store, so a later process can
//! resume with the same checkpoint metadata.

use crate::core::error::AppError;
use crate::core::types::{ErrorCategory, RunStatus};
use crate::core::workflow_graph::shared_store::SharedStore;
use crate::core::workflow_graph::state::{canonical_json, compute_sha256_hex};
use chrono::{DateTime, Utc};
use pflow_types::WorkflowIr;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Version embedded in persisted run records.
pub const RUN_FORMAT_VERSION: &str = "1";

/// Run metadata persisted next to the shared store snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub format_version: String,
    pub run_id: Uuid,
    pub workflow_hash: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub failed_node: Option<String>,
}

impl RunRecord {
    pub fn new(workflow_hash: String) -> Self {
        Self {
            format_version: RUN_FORMAT_VERSION.to_string(),
            run_id: Uuid::new_v4(),
            workflow_hash,
            started_at: Utc::now(),
            completed_at: None,
            status: RunStatus::Running,
            failed_node: None,
        }
    }

    pub fn finish(&mut self, status: RunStatus, failed_node: Option<String>) {
        self.status = status;
        self.failed_node = failed_node;
        self.completed_at = Some(Utc::now());
    }
}

/// Paths under `.pflow/state/runs/<run_id>`.
pub struct RunStatePaths {
    pub run_dir: PathBuf,
    pub run_file: PathBuf,
    pub shared_file: PathBuf,
}

impl RunStatePaths {
    pub fn new(workspace_root: &Path, run_id: &Uuid) -> Self {
        let run_dir = Self::runs_root(workspace_root).join(run_id.to_string());
        Self {
            run_file: run_dir.join("run.json"),
            shared_file: run_dir.join("shared.json"),
            run_dir,
        }
    }

    pub fn runs_root(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".pflow/state/runs")
    }
}

/// Hash of the workflow definition, used to refuse resuming a different workflow.
pub fn workflow_hash(ir: &WorkflowIr) -> Result<String, AppError> {
    let value = serde_json::to_value(ir)?;
    Ok(compute_sha256_hex(canonical_json(&value).as_bytes()))
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to create directory {}: {}", parent.display(), err),
            )
            .with_code("PFL-CKP-001")
        })?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to write {}: {}", tmp_path.display(), err),
        )
        .with_code("PFL-CKP-001")
    })?;
    fs::rename(&tmp_path, path).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!(
                "failed to rename {} -> {}: {}",
                tmp_path.display(),
                path.display(),
                err
            ),
        )
        .with_code("PFL-CKP-001")
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to read {}: {}", path.display(), err),
        )
        .with_code("PFL-CKP-002")
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        AppError::new(
            ErrorCategory::SerializationError,
            format!("failed to deserialize {}: {}", path.display(), err),
        )
        .with_code("PFL-CKP-002")
    })
}

/// Persist the run record and the full shared store, reserved keys included.
pub fn save_run(workspace_root: &Path, record: &RunRecord, shared: &SharedStore) -> Result<(), AppError> {
    let paths = RunStatePaths::new(workspace_root, &record.run_id);
    let run = serde_json::to_vec_pretty(record)?;
    let data = serde_json::to_vec_pretty(&Value::Object(shared.data().clone()))?;
    atomic_write(&paths.shared_file, &data)?;
    atomic_write(&paths.run_file, &run)?;
    tracing::debug!(run_id = %record.run_id, dir = %paths.run_dir.display(), "run state saved");
    Ok(())
}

/// Load a run record and a fresh shared store holding the saved data.
pub fn load_run(workspace_root: &Path, run_id: &Uuid) -> Result<(RunRecord, SharedStore), AppError> {
    let paths = RunStatePaths::new(workspace_root, run_id);
    let record: RunRecord = read_json(&paths.run_file)?;
    let data: Map<String, Value> = read_json(&paths.shared_file)?;
    Ok((record, SharedStore::from_data(data)))
}

/// Run ids with a saved record, newest first.
pub fn list_runs(workspace_root: &Path) -> Result<Vec<RunRecord>, AppError> {
    let base = RunStatePaths::runs_root(workspace_root);
    if !base.exists() {
        return Ok(Vec::new());
    }
    let mut records = Vec::new();
    for entry in fs::read_dir(&base)
        .map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to list run state: {}", err),
            )
            .with_code("PFL-CKP-002")
        })?
        .flatten()
    {
        if let Ok(run_id) = Uuid::parse_str(&entry.file_name().to_string_lossy()) {
            if let Ok(record) = read_json::<RunRecord>(&RunStatePaths::new(workspace_root, &run_id).run_file) {
                records.push(record);
            }
        }
    }
    records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(records)
}
