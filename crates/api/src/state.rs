use std::sync::Arc;

use vidforge_host::HostClient;

use crate::background::health::HealthState;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: vidforge_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Client for the remote host scheduler.
    pub host: Arc<HostClient>,
    /// Cached host/backend availability, refreshed by the health monitor.
    pub health: Arc<HealthState>,
}
