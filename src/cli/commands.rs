use crate::{
    cli::args::{RunArgs, RunsArgs, ValidateArgs},
    core::{
        types::{ResolutionMode, RunStatus},
        workflow_graph::{
            compile_ir_to_flow, list_runs, load_registry, load_run, load_workflow,
            nodes::builtin_registry, prepare_inputs, save_run, validate_workflow_templates,
            workflow_hash, CompileOptions, NodeRegistry, ProgressEvent, ProgressKind, RunRecord,
            SharedStore,
        },
        ConfigLoader, PflowConfig,
    },
    Result,
};
use anyhow::{anyhow, Context};
use serde_json::{Map, Value};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parse repeated `KEY=VALUE` flags; values that are not JSON stay strings.
pub fn parse_params(raw: &[String]) -> Result<Map<String, Value>> {
    let mut params = Map::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid --param '{}', expected KEY=VALUE", entry))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("invalid --param '{}', key is empty", entry));
        }
        let value =
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

fn resolve_workspace(workspace: &Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => Ok(path.clone()),
        None => env::current_dir().context("failed to determine current directory"),
    }
}

fn build_registry(
    workspace: &Path,
    config: &PflowConfig,
    override_path: &Option<PathBuf>,
) -> Result<NodeRegistry> {
    let registry = builtin_registry(workspace.to_path_buf());
    match override_path.as_ref().or(config.registry.path.as_ref()) {
        Some(path) => {
            let extra = load_registry(path)?;
            tracing::debug!(path = %path.display(), node_types = extra.len(), "loaded registry metadata");
            Ok(registry.with_metadata(extra))
        }
        None => Ok(registry),
    }
}

pub async fn validate(args: ValidateArgs) -> Result<()> {
    let workspace = resolve_workspace(&args.workspace)?;
    let config = ConfigLoader::load_from_workspace(&workspace)?;
    let registry = build_registry(&workspace, &config, &args.registry)?;
    let ir = load_workflow(&args.workflow)?;
    let initial_params = prepare_inputs(&ir, parse_params(&args.params)?);

    tracing::info!(workflow = %args.workflow.display(), "validating workflow templates");
    let report = validate_workflow_templates(&ir, &initial_params, registry.metadata());

    for diagnostic in report.sorted() {
        println!("{}", diagnostic);
        if let (Some(node), Some(param)) = (&diagnostic.node_id, &diagnostic.param_path) {
            println!("    at {}.{}", node, param);
        }
    }

    let errors = report.errors().len();
    let warnings = report.warnings().len();
    if errors > 0 {
        return Err(anyhow!(
            "{} failed template validation: {} error(s), {} warning(s)",
            args.workflow.display(),
            errors,
            warnings
        ));
    }
    println!(
        "Workflow {} is valid ({} warning(s))",
        args.workflow.display(),
        warnings
    );
    Ok(())
}

pub async fn run(args: RunArgs) -> Result<()> {
    let workspace = resolve_workspace(&args.workspace)?;
    let mut config = ConfigLoader::load_from_workspace(&workspace)?;
    if args.permissive {
        config.execution.resolution_mode = ResolutionMode::Permissive;
    }
    if args.no_validate {
        config.execution.validate = false;
    }
    if let Some(max_steps) = args.max_steps {
        config.execution.max_steps = max_steps;
    }
    ConfigLoader::validate_config(&config)?;

    let registry = build_registry(&workspace, &config, &args.registry)?;
    let ir = load_workflow(&args.workflow)?;
    let compiled = compile_ir_to_flow(
        &ir,
        &registry,
        CompileOptions {
            initial_params: parse_params(&args.params)?,
            validate: config.execution.validate,
            resolution_mode: config.execution.resolution_mode,
            max_steps: config.execution.max_steps,
        },
    )?;

    let hash = workflow_hash(&ir)?;
    let (mut record, mut shared) = match args.resume {
        Some(run_id) => {
            let (record, mut shared) = load_run(&workspace, &run_id)?;
            if record.workflow_hash != hash {
                return Err(anyhow!(
                    "run {} was started from a different workflow definition",
                    run_id
                ));
            }
            shared.clear_failure()?;
            tracing::info!(run_id = %run_id, "resuming run");
            (record, shared)
        }
        None => (RunRecord::new(hash), SharedStore::new()),
    };
    shared.set_progress_callback(Arc::new(log_progress));

    let result = compiled.flow.run(&mut shared).await;
    let status = if result.is_ok() {
        RunStatus::Completed
    } else {
        RunStatus::Failed
    };
    record.finish(status, shared.failed_node()?);
    if config.execution.checkpoint {
        save_run(&workspace, &record, &shared)?;
    }

    for template_error in shared.template_errors() {
        eprintln!(
            "template error in {}.{}: {}",
            template_error.node_id, template_error.param, template_error.message
        );
    }

    if let Err(err) = result {
        let hint = if config.execution.checkpoint {
            format!(
                "; resume with `pflow run {} --resume {}`",
                args.workflow.display(),
                record.run_id
            )
        } else {
            String::new()
        };
        return Err(anyhow!("run {} failed: {}{}", record.run_id, err, hint));
    }

    tracing::info!(run_id = %record.run_id, status = record.status.as_str(), "run finished");
    let outputs = compiled.flow.collect_outputs(&shared);
    println!("{}", serde_json::to_string_pretty(&Value::Object(outputs))?);
    Ok(())
}

fn log_progress(event: &ProgressEvent) {
    match event.kind {
        ProgressKind::Start => tracing::info!(node_id = %event.node_id, "node started"),
        ProgressKind::Cached => tracing::info!(node_id = %event.node_id, "node reused from checkpoint"),
        ProgressKind::Complete => tracing::info!(
            node_id = %event.node_id,
            duration_ms = event.duration_ms.unwrap_or_default(),
            "node completed"
        ),
        ProgressKind::Failed => tracing::warn!(
            node_id = %event.node_id,
            duration_ms = event.duration_ms.unwrap_or_default(),
            "node failed"
        ),
    }
}

pub async fn runs(args: RunsArgs) -> Result<()> {
    let workspace = resolve_workspace(&args.workspace)?;
    let records = list_runs(&workspace)?;
    if records.is_empty() {
        println!("No saved runs in {}", workspace.display());
        return Ok(());
    }
    for record in records {
        print!(
            "{}  {:<9}  {}",
            record.run_id,
            record.status.as_str(),
            record.started_at.to_rfc3339()
        );
        match record.failed_node {
            Some(node) => println!("  failed at {}", node),
            None => println!(),
        }
    }
    Ok(())
}
