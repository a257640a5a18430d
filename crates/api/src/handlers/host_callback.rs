//! Handler for the host-initiated `POST /api/host/run-job` callback.
//!
//! The host scheduler does not run generation code itself; at trigger
//! time it POSTs here with the shared bearer token, and this handler
//! claims the job and spawns the generator. The response is sent as
//! soon as the run row exists — the generator finishes on its own task.

use axum::response::IntoResponse;
use axum::{extract::State, Json};
use serde_json::json;
use vidforge_core::error::CoreError;
use vidforge_core::jobspec::RunJobCallback;
use vidforge_db::repositories::JobRepo;

use crate::dispatch;
use crate::error::{AppError, AppResult};
use crate::middleware::callback_auth::CallbackAuth;
use crate::state::AppState;

/// POST /api/host/run-job
///
/// Resolves the job by `jobId` or `taskName` (either works; `jobId`
/// wins when both are present), claims it via check-and-set, creates a
/// run, and replies `{"status": "ok", "runId": ...}` before the
/// generator completes.
pub async fn run_job(
    _auth: CallbackAuth,
    State(state): State<AppState>,
    Json(payload): Json<RunJobCallback>,
) -> AppResult<impl IntoResponse> {
    let job = match (payload.job_id, payload.task_name.as_deref()) {
        (Some(id), _) => JobRepo::find_by_id(&state.pool, id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound { entity: "Job", id }))?,
        (None, Some(name)) => JobRepo::find_by_task_name(&state.pool, name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No job with task name '{name}'")))?,
        (None, None) => {
            return Err(AppError::BadRequest(
                "Callback must include jobId or taskName".into(),
            ));
        }
    };

    let run = dispatch::begin(&state.pool, &job).await?.ok_or_else(|| {
        AppError::Core(CoreError::Conflict(format!(
            "Job {} is not eligible to run (status {})",
            job.id, job.status
        )))
    })?;

    tracing::info!(
        job_id = job.id,
        run_id = run.id,
        task_name = %job.task_name,
        "Host callback accepted",
    );

    let run_id = run.id;
    dispatch::spawn_finish(state.clone(), job, run);

    Ok(Json(json!({ "status": "ok", "runId": run_id })))
}
