// src/config.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Default number of parallel workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default pass/fail score threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Default target table for persisted scores.
pub const DEFAULT_TABLE: &str = "project_score";

/// Delay held after each task before its worker slot is reused, giving the
/// storage backend time to reclaim the dropped connection.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root directory holding the per-project computation inputs.
    pub repo_root: PathBuf,
    pub table: String,
    pub threshold: f64,
    pub workers: usize,
    pub settle_delay: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            table: DEFAULT_TABLE.to_string(),
            threshold: DEFAULT_THRESHOLD,
            workers: DEFAULT_WORKERS,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl RunConfig {
    /// Reads configuration from SCORECARD_* environment variables, falling
    /// back to the defaults above.
    pub fn from_env() -> Result<Self> {
        let mut config = RunConfig::default();
        if let Ok(v) = std::env::var("SCORECARD_REPO_ROOT") {
            config.repo_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SCORECARD_TABLE") {
            config.table = v;
        }
        if let Ok(v) = std::env::var("SCORECARD_THRESHOLD") {
            config.threshold = v
                .parse()
                .context("SCORECARD_THRESHOLD must be a number")?;
        }
        if let Ok(v) = std::env::var("SCORECARD_WORKERS") {
            config.workers = v
                .parse()
                .context("SCORECARD_WORKERS must be a positive integer")?;
        }
        if let Ok(v) = std::env::var("SCORECARD_SETTLE_MS") {
            let ms: u64 = v
                .parse()
                .context("SCORECARD_SETTLE_MS must be a duration in milliseconds")?;
            config.settle_delay = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("worker count must be at least 1");
        }
        if !self.threshold.is_finite() {
            bail!("score threshold must be finite");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_workers_fails_validation() {
        let config = RunConfig {
            workers: 0,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_finite_threshold_fails_validation() {
        let config = RunConfig {
            threshold: f64::NAN,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
