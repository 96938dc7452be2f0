// src/run.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info};
use thiserror::Error;

use crate::config::RunConfig;
use crate::models::{merge, AttributeValue, ProjectId, RawResults};
use crate::pool::WorkerPool;
use crate::provider::AttributeProvider;
use crate::results::{self, RunReport, TaskOutcome};
use crate::storage::{insert_sql, select_sql, update_sql, Storage};

/// Why one project's cycle produced no persisted row. Failures stay scoped
/// to their project; siblings keep running.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("attribute computation failed: {0:#}")]
    Computation(anyhow::Error),
    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),
}

/// Orchestrates one scoring run: fans one task per project out to a bounded
/// worker pool, then merges and persists each successful result.
pub struct Run {
    repo_root: PathBuf,
    provider: Arc<dyn AttributeProvider>,
    storage: Arc<dyn Storage>,
    threshold: f64,
    workers: usize,
    settle_delay: Duration,
}

impl Run {
    pub fn new(
        provider: Arc<dyn AttributeProvider>,
        storage: Arc<dyn Storage>,
        config: &RunConfig,
    ) -> Self {
        Self {
            repo_root: config.repo_root.clone(),
            provider,
            storage,
            threshold: config.threshold,
            workers: config.workers,
            settle_delay: config.settle_delay,
        }
    }

    /// Executes one full run over `samples`, writing scored rows to `table`.
    ///
    /// Never returns an error: per-project failures are logged and counted,
    /// and a setup failure lands in [`RunReport::fatal`]. The closing banner
    /// prints no matter how much of the run survived.
    pub async fn run(&self, samples: &HashSet<ProjectId>, table: &str) -> RunReport {
        let mut report = RunReport::new();
        results::print_banner("Run");
        info!(
            "Run {} started: {} project(s), {} worker(s), table {}",
            report.run_id,
            samples.len(),
            self.workers,
            table
        );

        match self.dispatch(samples, table).await {
            Ok(outcomes) => {
                for outcome in outcomes {
                    report.record(outcome);
                }
            }
            Err(e) => {
                error!("Run {} aborted during setup: {:#}", report.run_id, e);
                report.fatal = Some(format!("{:#}", e));
            }
        }

        results::print_rule();
        info!(
            "Run {} finished: {} persisted, {} skipped, {} failed",
            report.run_id, report.persisted, report.skipped, report.failed
        );
        report
    }

    /// Global init plus the fan-out/fan-in cycle. Errors from this stage are
    /// setup failures; everything past submission reports per project.
    async fn dispatch(
        &self,
        samples: &HashSet<ProjectId>,
        table: &str,
    ) -> Result<Vec<TaskOutcome>> {
        self.provider
            .global_init(samples)
            .context("Global provider initialization failed")?;

        let mut pool = WorkerPool::new(self.workers).context("Failed to construct worker pool")?;

        // One task per project, no batching: a failure can only ever take
        // down its own project.
        for &project_id in samples {
            let provider = Arc::clone(&self.provider);
            let storage = Arc::clone(&self.storage);
            let repo_root = self.repo_root.clone();
            let table = table.to_string();
            let threshold = self.threshold;
            let settle_delay = self.settle_delay;

            pool.submit(async move {
                let outcome = process_one(
                    project_id, provider, storage, repo_root, &table, threshold,
                )
                .await
                .unwrap_or_else(|e| {
                    error!("Project {}: {}", project_id, e);
                    TaskOutcome::Failed { project_id }
                });

                // Hold the worker slot until the storage backend has had time
                // to reclaim this task's connection.
                tokio::time::sleep(settle_delay).await;
                outcome
            });
        }

        Ok(pool.join().await)
    }
}

/// One project's full cycle: compute on a blocking thread, then merge and
/// persist. A result set is only ever persisted when the computation for
/// this exact project succeeded.
async fn process_one(
    project_id: ProjectId,
    provider: Arc<dyn AttributeProvider>,
    storage: Arc<dyn Storage>,
    repo_root: PathBuf,
    table: &str,
    threshold: f64,
) -> Result<TaskOutcome, TaskError> {
    let worker_provider = Arc::clone(&provider);
    let fresh = tokio::task::spawn_blocking(move || worker_provider.run(project_id, &repo_root))
        .await
        .map_err(|e| TaskError::Computation(anyhow::Error::new(e)))?
        .map_err(TaskError::Computation)?;

    if !provider.is_persistence_enabled() {
        echo_results(project_id, &fresh);
        return Ok(TaskOutcome::Skipped { project_id });
    }

    let score = persist(project_id, &fresh, table, provider.as_ref(), storage.as_ref())
        .await
        .map_err(TaskError::Persistence)?;

    let passed = score >= threshold;
    results::print_outcome(project_id, score, passed);
    Ok(TaskOutcome::Persisted {
        project_id,
        score,
        passed,
    })
}

/// Merge-and-persist for one project: overlays the fresh results on whatever
/// meaningful row already exists, scores the merged set, and writes either a
/// new row or an update of the freshly recomputed columns.
async fn persist(
    project_id: ProjectId,
    fresh: &RawResults,
    table: &str,
    provider: &dyn AttributeProvider,
    storage: &dyn Storage,
) -> Result<f64> {
    let existing = fetch_existing(project_id, table, provider, storage).await?;
    let is_existing = existing.is_some();

    let merged = merge(existing.unwrap_or_default(), fresh);
    let score = provider.score(&merged);

    let (columns, mut params) = write_columns(project_id, score, fresh, provider);
    let sql = if is_existing {
        params.push(AttributeValue::Integer(project_id.0));
        update_sql(table, &columns)
    } else {
        insert_sql(table, &columns)
    };

    storage
        .post(&sql, &params)
        .await
        .with_context(|| format!("Failed to write scored row for project {}", project_id))?;
    Ok(score)
}

/// Reads the previously persisted attribute row. A row whose declared
/// columns are all null or falsy is treated as absent: it marks a project
/// that earlier runs saw but never actually computed.
async fn fetch_existing(
    project_id: ProjectId,
    table: &str,
    provider: &dyn AttributeProvider,
    storage: &dyn Storage,
) -> Result<Option<RawResults>> {
    let columns: Vec<String> = provider
        .attributes()
        .iter()
        .map(|a| a.name.clone())
        .collect();
    if columns.is_empty() {
        return Ok(None);
    }

    let sql = select_sql(table, &columns);
    let row = storage
        .get(&sql, &[AttributeValue::Integer(project_id.0)])
        .await
        .with_context(|| format!("Failed to read existing row for project {}", project_id))?;

    let Some(values) = row else {
        return Ok(None);
    };
    let existing: RawResults = columns.into_iter().zip(values).collect();
    if existing.values().any(AttributeValue::is_meaningful) {
        Ok(Some(existing))
    } else {
        Ok(None)
    }
}

/// Column selection for the write: always `project_id` and `score`, plus
/// every declared attribute, in declared order, that is marked persist and
/// carries a non-null fresh value. Existing-only keys are never rewritten;
/// an update touches only what this run recomputed.
fn write_columns(
    project_id: ProjectId,
    score: f64,
    fresh: &RawResults,
    provider: &dyn AttributeProvider,
) -> (Vec<String>, Vec<AttributeValue>) {
    let mut columns = vec!["project_id".to_string(), "score".to_string()];
    let mut values = vec![
        AttributeValue::Integer(project_id.0),
        AttributeValue::Float(score),
    ];

    for descriptor in provider.attributes() {
        if !descriptor.persist {
            continue;
        }
        if let Some(value) = fresh.get(&descriptor.name) {
            if !value.is_null() {
                columns.push(descriptor.name.clone());
                values.push(value.clone());
            }
        }
    }
    (columns, values)
}

fn echo_results(project_id: ProjectId, results: &RawResults) {
    for (attribute, value) in results {
        debug!("[{:>10}] {:<25} {:?}", project_id.0, attribute, value);
    }
}
