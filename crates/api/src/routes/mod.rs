pub mod health;
pub mod host_callback;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                    list, create
/// /jobs/{id}               get
/// /jobs/{id}/runs          run history
/// /jobs/{id}/run-now       immediate execution (POST)
/// /jobs/{id}/cancel        cancel (POST)
/// ```
///
/// The host callback (`/api/host/run-job`) and `/health` are mounted at
/// the root level, not under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}
