use crate::config::{config_from_env, load_config, Config};
use crate::run::{Orchestrator, RunContext, RunError, RunReport};
use std::path::PathBuf;
use tracing::info;

pub async fn run(config_path: Option<PathBuf>, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let report = run_once(config_path, dry_run).await?;
    if !report.is_drained() {
        info!(
            failed = report.delivery.failed,
            "Run finished with undelivered events; they will be fetched again next run"
        );
    }
    Ok(())
}

/// Load configuration, open the checkpoint store and perform one run.
pub async fn run_once(config_path: Option<PathBuf>, dry_run: bool) -> Result<RunReport, RunError> {
    let config = load(config_path)?;
    info!(
        base_url = %config.upstream.base_url,
        event_type = %config.upstream.event_type,
        "Starting anomaly connector"
    );

    let ctx = RunContext::from_config(config)?.with_dry_run(dry_run);
    info!(store = %ctx.tracker.store().describe(), "Checkpoint store ready");
    Orchestrator::new(ctx).run().await
}

fn load(config_path: Option<PathBuf>) -> Result<Config, RunError> {
    match config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            Ok(load_config(&path)?)
        }
        None => {
            info!("No config file found, reading configuration from environment");
            Ok(config_from_env()?)
        }
    }
}
