//! Repository for the `job_runs` table.

use chrono::Utc;
use vidforge_core::lifecycle::RunStatus;
use vidforge_core::types::DbId;

use crate::models::run::{JobRun, RunOutcome};
use crate::DbPool;

/// Column list for `job_runs` queries.
const COLUMNS: &str = "\
    id, job_id, started_at, finished_at, status, \
    output_path, log_path, host_exit_code, error_message";

/// Default page size for run history.
const DEFAULT_LIMIT: i64 = 20;

/// Maximum page size for run history.
const MAX_LIMIT: i64 = 100;

/// Provides CRUD operations for job runs.
pub struct RunRepo;

impl RunRepo {
    /// Create a run in `running` status for the given job.
    pub async fn create(pool: &DbPool, job_id: DbId) -> Result<JobRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO job_runs (job_id, started_at, status) \
             VALUES (?, ?, ?) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRun>(&query)
            .bind(job_id)
            .bind(Utc::now())
            .bind(RunStatus::Running.as_str())
            .fetch_one(pool)
            .await
    }

    /// Apply a terminal outcome, setting `finished_at`.
    ///
    /// Fail-closed: the update only matches a run whose `finished_at`
    /// is still null, so completing an already-terminal run returns
    /// `false` instead of silently overwriting it.
    pub async fn complete(
        pool: &DbPool,
        run_id: DbId,
        outcome: &RunOutcome,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE job_runs \
             SET finished_at = ?, status = ?, output_path = ?, \
                 host_exit_code = ?, error_message = ? \
             WHERE id = ? AND finished_at IS NULL",
        )
        .bind(Utc::now())
        .bind(outcome.status.as_str())
        .bind(&outcome.output_path)
        .bind(outcome.host_exit_code)
        .bind(&outcome.error_message)
        .bind(run_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a run by its ID.
    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<JobRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM job_runs WHERE id = ?");
        sqlx::query_as::<_, JobRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Run history for a job, most recent first.
    pub async fn list_for_job(
        pool: &DbPool,
        job_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<JobRun>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let query = format!(
            "SELECT {COLUMNS} FROM job_runs WHERE job_id = ? \
             ORDER BY started_at DESC, id DESC LIMIT ?"
        );
        sqlx::query_as::<_, JobRun>(&query)
            .bind(job_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Startup recovery: runs left `running` by a previous process are
    /// marked failed (runs are never resumed across restarts).
    pub async fn fail_orphaned(pool: &DbPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE job_runs \
             SET status = ?, finished_at = ?, error_message = ? \
             WHERE status = ?",
        )
        .bind(RunStatus::Failed.as_str())
        .bind(Utc::now())
        .bind("Interrupted by orchestrator restart")
        .bind(RunStatus::Running.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
