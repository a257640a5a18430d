//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> create_job
/// GET    /{id}            -> get_job
/// GET    /{id}/runs       -> list_runs
/// POST   /{id}/run-now    -> run_job_now
/// POST   /{id}/cancel     -> cancel_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/runs", get(jobs::list_runs))
        .route("/{id}/run-now", post(jobs::run_job_now))
        .route("/{id}/cancel", post(jobs::cancel_job))
}
