// src/main.rs
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use scorecard_lib::{
    config::RunConfig, db, models::ProjectId, provider::ManifestProvider, run::Run,
    storage::PgStorage,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    info!("Starting project scoring pipeline");

    // Try to load .env file if it exists
    let env_paths = [".env", ".env.local", "../.env"];
    let mut loaded_env = false;

    for path in env_paths.iter() {
        if Path::new(path).exists() {
            if let Err(e) = db::load_env_from_file(path) {
                warn!("Failed to load environment from {}: {}", path, e);
            } else {
                info!("Loaded environment variables from {}", path);
                loaded_env = true;
                break;
            }
        }
    }

    if !loaded_env {
        info!("No .env file found, using environment variables from system");
    }

    let config = RunConfig::from_env().context("Invalid run configuration")?;

    let samples = parse_project_ids()?;
    if samples.is_empty() {
        warn!("No project IDs supplied; nothing to do");
        return Ok(());
    }

    let pool = db::connect()
        .await
        .context("Failed to connect to database")?;
    info!("Successfully connected to the database");

    let manifest_path = config.repo_root.join("attributes_manifest.json");
    let provider = Arc::new(
        ManifestProvider::from_manifest(&manifest_path)
            .context("Failed to load attribute manifest")?,
    );
    let storage = Arc::new(PgStorage::new(pool));

    let table = config.table.clone();
    let run = Run::new(provider, storage, &config);
    let report = run.run(&samples, &table).await;

    info!(
        "Run {} complete: {}/{} persisted, {} failed",
        report.run_id, report.persisted, report.processed, report.failed
    );

    if !report.is_success() {
        // Make failed runs visible to shells, not just to the error log
        std::process::exit(1);
    }
    Ok(())
}

/// Project IDs arrive as positional arguments; duplicates collapse into the
/// sample set.
fn parse_project_ids() -> Result<HashSet<ProjectId>> {
    std::env::args()
        .skip(1)
        .map(|arg| {
            arg.parse::<i64>()
                .map(ProjectId)
                .with_context(|| format!("Invalid project ID: {}", arg))
        })
        .collect()
}
