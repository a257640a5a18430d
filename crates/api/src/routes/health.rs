use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable.
    pub db_healthy: bool,
    /// Cached availability of the remote host scheduler.
    pub host_available: bool,
    /// Cached availability of the generation backend.
    pub backend_available: bool,
}

/// GET /health -- service + database + cached external availability.
///
/// External availability comes from the health monitor's cache; this
/// handler never probes the host or backend inline.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = vidforge_db::health_check(&state.pool).await.is_ok();

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        host_available: state.health.host_available(),
        backend_available: state.health.backend_available(),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
