//! Handlers for the `/jobs` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use vidforge_core::error::CoreError;
use vidforge_core::schedule::{host_day_name, parse_hhmm};
use vidforge_core::types::{DbId, Timestamp};
use vidforge_db::models::job::{Job, NewJob, ScheduleKind};
use vidforge_db::repositories::{JobRepo, RunRepo};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::scheduler::{self, ArmedVia};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct CreateJob {
    pub task_name: String,
    pub job_type: String,
    pub prompt: Option<String>,
    pub character: Option<String>,
    pub environment: Option<String>,
    pub video_length: Option<i64>,
    pub fps: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub schedule_kind: ScheduleKind,
    /// Required for one-time jobs, forbidden for recurring.
    pub schedule_dt: Option<Timestamp>,
    /// Lowercase weekday names; required for recurring jobs.
    pub recurring_days: Option<Vec<String>>,
    /// `HH:MM`; required for recurring jobs.
    pub recurring_time: Option<String>,
}

impl CreateJob {
    /// Enforce the schedule-field invariants before any row exists.
    fn validate(&self) -> Result<(), CoreError> {
        if self.task_name.trim().is_empty() {
            return Err(CoreError::Validation("task_name must not be empty".into()));
        }
        if self.job_type.trim().is_empty() {
            return Err(CoreError::Validation("job_type must not be empty".into()));
        }

        match self.schedule_kind {
            ScheduleKind::OneTime => {
                if self.schedule_dt.is_none() {
                    return Err(CoreError::Validation(
                        "One-time jobs require schedule_dt".into(),
                    ));
                }
                if self.recurring_days.is_some() || self.recurring_time.is_some() {
                    return Err(CoreError::Validation(
                        "One-time jobs must not set recurring_days or recurring_time".into(),
                    ));
                }
            }
            ScheduleKind::Recurring => {
                if self.schedule_dt.is_some() {
                    return Err(CoreError::Validation(
                        "Recurring jobs must not set schedule_dt".into(),
                    ));
                }
                let days = self
                    .recurring_days
                    .as_deref()
                    .filter(|d| !d.is_empty())
                    .ok_or_else(|| {
                        CoreError::Validation("Recurring jobs require recurring_days".into())
                    })?;
                for day in days {
                    if host_day_name(&day.to_ascii_lowercase()).is_none() {
                        return Err(CoreError::Validation(format!(
                            "Unknown weekday name: {day}"
                        )));
                    }
                }
                let time = self.recurring_time.as_deref().ok_or_else(|| {
                    CoreError::Validation("Recurring jobs require recurring_time".into())
                })?;
                parse_hhmm(time)?;
            }
        }
        Ok(())
    }

    fn into_new_job(self) -> NewJob {
        let recurring_days = self.recurring_days.map(|days| {
            days.iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join(",")
        });
        NewJob {
            task_name: self.task_name,
            job_type: self.job_type,
            prompt: self.prompt,
            character: self.character,
            environment: self.environment,
            video_length: self.video_length,
            fps: self.fps,
            width: self.width,
            height: self.height,
            schedule_kind: self.schedule_kind,
            schedule_dt: self.schedule_dt,
            recurring_days,
            recurring_time: self.recurring_time,
        }
    }
}

/// A job as responses carry it: the stored row plus the derived
/// human-readable schedule description.
#[derive(Debug, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub schedule_summary: Option<String>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        let schedule_summary = job.schedule_summary();
        Self {
            job,
            schedule_summary,
        }
    }
}

/// Payload of the create response: the stored job plus where its
/// trigger lives.
#[derive(Debug, Serialize)]
pub struct CreatedJob {
    pub job: JobView,
    pub armed_via: ArmedVia,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RunNowResponse {
    pub mode: ArmedVia,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_or_404(pool: &vidforge_db::DbPool, id: DbId) -> AppResult<Job> {
    JobRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Job", id }))
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create a job and arm its trigger. Returns 201 with the stored job.
/// A duplicate `task_name` is rejected with 409 before any row exists.
pub async fn create_job(
    State(state): State<AppState>,
    Json(input): Json<CreateJob>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let job = JobRepo::create(&state.pool, &input.into_new_job()).await?;

    tracing::info!(
        job_id = job.id,
        task_name = %job.task_name,
        job_type = %job.job_type,
        schedule_kind = %job.schedule_kind,
        "Job created",
    );

    let armed_via = scheduler::schedule_new_job(&state, &job).await?;

    // Re-read so the response carries the post-scheduling status.
    let job = find_or_404(&state.pool, job.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedJob {
                job: job.into(),
                armed_via,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// List / get / runs
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list(&state.pool, query.limit).await?;
    let jobs: Vec<JobView> = jobs.into_iter().map(JobView::from).collect();
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_or_404(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: JobView::from(job),
    }))
}

/// GET /api/v1/jobs/{id}/runs
///
/// Run history for a job, most recent first.
pub async fn list_runs(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(query): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    find_or_404(&state.pool, id).await?;
    let runs = RunRepo::list_for_job(&state.pool, id, query.limit).await?;
    Ok(Json(DataResponse { data: runs }))
}

// ---------------------------------------------------------------------------
// Run now
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/run-now
///
/// Immediate execution via the host scheduler when it is available,
/// local dispatch otherwise.
pub async fn run_job_now(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_or_404(&state.pool, id).await?;
    let mode = scheduler::run_now(&state, &job).await?;

    tracing::info!(job_id = id, ?mode, "Immediate run triggered");
    Ok(Json(DataResponse {
        data: RunNowResponse { mode },
    }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Flip the job to `cancelled` and, when the trigger was delegated to
/// the host scheduler, delete the host task best-effort — a host
/// failure is logged, never surfaced, because the cancelled status
/// alone already guarantees the job can never dispatch again.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = find_or_404(&state.pool, id).await?;

    if !JobRepo::cancel(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Job {id} cannot be cancelled in status {}",
            job.status
        ))));
    }

    if job.host_script_path.is_some() {
        if let Err(e) = state.host.delete_task(&job.task_name).await {
            tracing::warn!(
                job_id = id,
                task_name = %job.task_name,
                error = %e,
                "Failed to delete host task; job is cancelled regardless",
            );
        }
    }

    tracing::info!(job_id = id, task_name = %job.task_name, "Job cancelled");
    let job = find_or_404(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: JobView::from(job),
    }))
}
