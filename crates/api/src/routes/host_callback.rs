//! Route definition for the host-initiated run callback.

use axum::routing::post;
use axum::Router;

use crate::handlers::host_callback;
use crate::state::AppState;

/// Mount the callback route at its absolute path (root-level, not under
/// `/api/v1` — the path is part of the host wire contract).
pub fn router() -> Router<AppState> {
    Router::new().route("/api/host/run-job", post(host_callback::run_job))
}
