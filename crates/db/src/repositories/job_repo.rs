//! Repository for the `jobs` table.
//!
//! Status literals never appear inline; all transitions go through
//! `JobStatus` from `vidforge_core::lifecycle`.

use chrono::Utc;
use vidforge_core::lifecycle::JobStatus;
use vidforge_core::types::DbId;

use crate::models::job::{Job, JobStatusUpdate, NewJob};
use crate::DbPool;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, task_name, job_type, prompt, character, environment, \
    video_length, fps, width, height, \
    schedule_kind, schedule_dt, recurring_days, recurring_time, \
    status, host_script_path, host_log_path, last_error, \
    created_at, updated_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides CRUD operations for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new job in `pending` status. A `task_name` collision
    /// surfaces as a unique-violation database error before any row is
    /// written.
    pub async fn create(pool: &DbPool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO jobs (
                 task_name, job_type, prompt, character, environment,
                 video_length, fps, width, height,
                 schedule_kind, schedule_dt, recurring_days, recurring_time,
                 status, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&input.task_name)
            .bind(&input.job_type)
            .bind(&input.prompt)
            .bind(&input.character)
            .bind(&input.environment)
            .bind(input.video_length)
            .bind(input.fps)
            .bind(input.width)
            .bind(input.height)
            .bind(input.schedule_kind.as_str())
            .bind(input.schedule_dt)
            .bind(&input.recurring_days)
            .bind(&input.recurring_time)
            .bind(JobStatus::Pending.as_str())
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    /// Partial lifecycle update. `None` fields are left untouched;
    /// `updated_at` is always bumped.
    ///
    /// A status change is guarded by the transition table: the update
    /// only applies when the row's current status legally reaches the
    /// target (re-asserting the current status is also accepted, so a
    /// repeated failure report keeps the latest error). Returns `false`
    /// when the guard refused the write; nothing was changed then, the
    /// other fields included.
    pub async fn update_status(
        pool: &DbPool,
        job_id: DbId,
        update: &JobStatusUpdate,
    ) -> Result<bool, sqlx::Error> {
        let mut fields: Vec<&str> = Vec::new();
        if update.status.is_some() {
            fields.push("status = ?");
        }
        if update.host_script_path.is_some() {
            fields.push("host_script_path = ?");
        }
        if update.host_log_path.is_some() {
            fields.push("host_log_path = ?");
        }
        if update.last_error.is_some() {
            fields.push("last_error = ?");
        }
        fields.push("updated_at = ?");

        let mut query = format!("UPDATE jobs SET {} WHERE id = ?", fields.join(", "));
        let sources: Vec<&'static str> = match update.status {
            Some(target) => JobStatus::ALL
                .into_iter()
                .filter(|s| *s == target || s.can_transition(target))
                .map(JobStatus::as_str)
                .collect(),
            None => Vec::new(),
        };
        if !sources.is_empty() {
            let placeholders = vec!["?"; sources.len()].join(", ");
            query.push_str(&format!(" AND status IN ({placeholders})"));
        }

        let mut q = sqlx::query(&query);
        if let Some(status) = update.status {
            q = q.bind(status.as_str());
        }
        if let Some(path) = &update.host_script_path {
            q = q.bind(path);
        }
        if let Some(path) = &update.host_log_path {
            q = q.bind(path);
        }
        if let Some(err) = &update.last_error {
            q = q.bind(err);
        }
        q = q.bind(Utc::now()).bind(job_id);
        for source in sources {
            q = q.bind(source);
        }
        let result = q.execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Optimistic check-and-set to `running`.
    ///
    /// Succeeds only from a dispatch-eligible status, so a concurrent
    /// second trigger (or a fire against a cancelled job) is refused.
    /// Returns `true` when this caller won the transition.
    pub async fn mark_running(pool: &DbPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status = ?, updated_at = ? \
             WHERE id = ? AND status NOT IN (?, ?)",
        )
        .bind(JobStatus::Running.as_str())
        .bind(Utc::now())
        .bind(job_id)
        .bind(JobStatus::Running.as_str())
        .bind(JobStatus::Cancelled.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a job unless it is running or already cancelled.
    ///
    /// Cancellation never removes the row; an in-flight run is not
    /// interrupted (best-effort semantics, documented at the API).
    pub async fn cancel(pool: &DbPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status = ?, updated_at = ? \
             WHERE id = ? AND status NOT IN (?, ?)",
        )
        .bind(JobStatus::Cancelled.as_str())
        .bind(Utc::now())
        .bind(job_id)
        .bind(JobStatus::Running.as_str())
        .bind(JobStatus::Cancelled.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = ?");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job by its unique task name.
    pub async fn find_by_task_name(
        pool: &DbPool,
        task_name: &str,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE task_name = ?");
        sqlx::query_as::<_, Job>(&query)
            .bind(task_name)
            .fetch_optional(pool)
            .await
    }

    /// List jobs, most recently created first.
    pub async fn list(pool: &DbPool, limit: Option<i64>) -> Result<Vec<Job>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let query = format!(
            "SELECT {COLUMNS} FROM jobs ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// List jobs in a given status (used by startup re-arming).
    pub async fn list_by_status(
        pool: &DbPool,
        statuses: &[JobStatus],
    ) -> Result<Vec<Job>, sqlx::Error> {
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE status IN ({placeholders}) \
             ORDER BY created_at ASC"
        );
        let mut q = sqlx::query_as::<_, Job>(&query);
        for status in statuses {
            q = q.bind(status.as_str());
        }
        q.fetch_all(pool).await
    }

    /// Startup recovery: any job still `running` was interrupted by a
    /// restart; move it to `failed` with an explanatory error.
    pub async fn fail_interrupted(pool: &DbPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status = ?, last_error = ?, updated_at = ? \
             WHERE status = ?",
        )
        .bind(JobStatus::Failed.as_str())
        .bind("Interrupted by orchestrator restart")
        .bind(Utc::now())
        .bind(JobStatus::Running.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
