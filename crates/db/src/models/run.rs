//! JobRun entity model and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use vidforge_core::lifecycle::RunStatus;
use vidforge_core::types::{DbId, Timestamp};

/// A row from the `job_runs` table: one execution attempt of a job.
///
/// Invariant: `finished_at` is non-null iff `status` is terminal
/// (`completed` or `failed`). Enforced by the repository, which only
/// writes terminal statuses together with `finished_at`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobRun {
    pub id: DbId,
    pub job_id: DbId,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub status: String,
    pub output_path: Option<String>,
    pub log_path: Option<String>,
    pub host_exit_code: Option<i64>,
    pub error_message: Option<String>,
}

impl JobRun {
    /// Parsed run status; unrecognized text reads as failed.
    pub fn lifecycle_status(&self) -> RunStatus {
        self.status.parse().unwrap_or(RunStatus::Failed)
    }
}

/// Terminal outcome applied to a run exactly once.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub output_path: Option<String>,
    pub host_exit_code: Option<i64>,
    pub error_message: Option<String>,
}

impl RunOutcome {
    /// A successful run with its published artifact.
    pub fn completed(output_path: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Completed,
            output_path: Some(output_path.into()),
            host_exit_code: Some(0),
            error_message: None,
        }
    }

    /// A failed run with the captured error text.
    pub fn failed(error: impl Into<String>, exit_code: Option<i64>) -> Self {
        Self {
            status: RunStatus::Failed,
            output_path: None,
            host_exit_code: exit_code,
            error_message: Some(error.into()),
        }
    }
}
