// src/results.rs

use chrono::{NaiveDateTime, Utc};
use uuid::Uuid;

use crate::models::ProjectId;

/// Outcome of one project's compute-and-persist cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Computed, merged and written; `passed` is score >= threshold.
    Persisted {
        project_id: ProjectId,
        score: f64,
        passed: bool,
    },
    /// Computed while persistence is disabled; nothing was written.
    Skipped { project_id: ProjectId },
    /// Computation or persistence failed; details are on the error log.
    Failed { project_id: ProjectId },
}

impl TaskOutcome {
    pub fn project_id(&self) -> ProjectId {
        match self {
            TaskOutcome::Persisted { project_id, .. }
            | TaskOutcome::Skipped { project_id }
            | TaskOutcome::Failed { project_id } => *project_id,
        }
    }
}

/// Summary of one pipeline run. `run` always returns one of these; a setup
/// failure is carried in `fatal` instead of being raised to the caller.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
    pub processed: usize,
    pub persisted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub fatal: Option<String>,
    pub outcomes: Vec<TaskOutcome>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            run_timestamp: Utc::now().naive_utc(),
            processed: 0,
            persisted: 0,
            skipped: 0,
            failed: 0,
            fatal: None,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: TaskOutcome) {
        self.processed += 1;
        match outcome {
            TaskOutcome::Persisted { .. } => self.persisted += 1,
            TaskOutcome::Skipped { .. } => self.skipped += 1,
            TaskOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    /// True when the run set up cleanly and every project came through.
    pub fn is_success(&self) -> bool {
        self.fatal.is_none() && self.failed == 0
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

const BANNER_WIDTH: usize = 25;

/// Framing banner around a run, matching the width of the outcome lines.
pub fn print_banner(title: &str) {
    println!("{}", "#".repeat(BANNER_WIDTH));
    println!("{:^width$}", title, width = BANNER_WIDTH);
    println!("{}", "#".repeat(BANNER_WIDTH));
}

pub fn print_rule() {
    println!("{}", "#".repeat(BANNER_WIDTH));
}

/// Per-project outcome line with a green check or red cross.
pub fn print_outcome(project_id: ProjectId, score: f64, passed: bool) {
    let marker = if passed {
        "\x1b[92m\u{2713}\x1b[0m"
    } else {
        "\x1b[91m\u{2718}\x1b[0m"
    };
    println!(" [{:>10}] {} {}", project_id.0, score, marker);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_each_outcome_kind() {
        let mut report = RunReport::new();
        report.record(TaskOutcome::Persisted {
            project_id: ProjectId(1),
            score: 7.0,
            passed: true,
        });
        report.record(TaskOutcome::Skipped {
            project_id: ProjectId(2),
        });
        report.record(TaskOutcome::Failed {
            project_id: ProjectId(3),
        });

        assert_eq!(report.processed, 3);
        assert_eq!(report.persisted, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert!(!report.is_success());
    }

    #[test]
    fn success_requires_no_failures_and_no_fatal() {
        let mut report = RunReport::new();
        report.record(TaskOutcome::Persisted {
            project_id: ProjectId(1),
            score: 1.0,
            passed: true,
        });
        assert!(report.is_success());

        report.fatal = Some("pool construction failed".into());
        assert!(!report.is_success());
    }
}
