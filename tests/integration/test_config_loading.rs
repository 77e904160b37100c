use pflow::core::config::ConfigLoader;
use pflow::core::types::{ErrorCategory, ResolutionMode};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_pflow_env() {
    for v in &[
        "PFLOW_RESOLUTION_MODE",
        "PFLOW_VALIDATE",
        "PFLOW_MAX_STEPS",
        "PFLOW_REGISTRY_PATH",
    ] {
        env::remove_var(v);
    }
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    clear_pflow_env();
    let temp_dir = TempDir::new().unwrap();

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    assert_eq!(config.execution.resolution_mode, ResolutionMode::Strict);
    assert!(config.execution.validate);
    assert!(config.execution.checkpoint);
    assert_eq!(config.execution.max_steps, 1000);
    assert!(config.registry.path.is_none());
}

#[test]
#[serial]
fn test_file_values_and_relative_registry_path() {
    clear_pflow_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("pflow.toml"),
        r#"
[execution]
resolution_mode = "permissive"
validate = false
max_steps = 25
checkpoint = false

[registry]
path = "nodes/registry.json"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    assert_eq!(config.execution.resolution_mode, ResolutionMode::Permissive);
    assert!(!config.execution.validate);
    assert_eq!(config.execution.max_steps, 25);
    assert!(!config.execution.checkpoint);
    assert_eq!(
        config.registry.path,
        Some(temp_dir.path().join("nodes/registry.json"))
    );
}

#[test]
#[serial]
fn test_env_overrides_file_values() {
    clear_pflow_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("pflow.toml"),
        "[execution]\nresolution_mode = \"strict\"\nmax_steps = 10\n",
    )
    .unwrap();

    env::set_var("PFLOW_RESOLUTION_MODE", "permissive");
    env::set_var("PFLOW_MAX_STEPS", "50");
    env::set_var("PFLOW_VALIDATE", "not-a-bool");
    env::set_var("PFLOW_REGISTRY_PATH", "/opt/pflow/registry.json");

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    clear_pflow_env();

    assert_eq!(config.execution.resolution_mode, ResolutionMode::Permissive);
    assert_eq!(config.execution.max_steps, 50);
    assert!(config.execution.validate);
    assert_eq!(
        config.registry.path,
        Some(PathBuf::from("/opt/pflow/registry.json"))
    );
}

#[test]
#[serial]
fn test_zero_max_steps_is_rejected() {
    clear_pflow_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("pflow.toml"),
        "[execution]\nmax_steps = 0\n",
    )
    .unwrap();

    let err = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    assert_eq!(err.category, ErrorCategory::ConfigError);
}

#[test]
#[serial]
fn test_invalid_toml_is_a_config_error() {
    clear_pflow_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("pflow.toml"), "[execution\n").unwrap();

    let err = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    assert_eq!(err.category, ErrorCategory::ConfigError);
}
