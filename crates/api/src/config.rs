use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Database URL (default: `sqlite://data/vidforge.db?mode=rwc`).
    pub database_url: String,
    /// Base URL of the remote host scheduler service.
    pub host_service_url: String,
    /// Public base URL of this service, used in host callback steps.
    pub public_base_url: String,
    /// Shared bearer token the host presents on `/api/host/run-job`.
    pub host_callback_token: String,
    /// Health probe interval in seconds (default: `15`).
    pub healthcheck_interval_secs: u64,
    /// Base URL of the generation backend probed for availability.
    pub backend_base_url: String,
    /// Directory holding one subdirectory per generator type.
    pub generators_root: PathBuf,
    /// Directory served as published media output.
    pub media_root: PathBuf,
    /// Wall-clock limit for one generator run (default: `7200`).
    pub generation_timeout_secs: u64,
    /// Generation-parameter defaults applied when a job sets none.
    pub default_video_length: i64,
    pub default_fps: i64,
    pub default_width: i64,
    pub default_height: i64,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var | Default |
    /// |---|---|
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `5000` |
    /// | `DATABASE_URL` | `sqlite://data/vidforge.db?mode=rwc` |
    /// | `HOST_SERVICE_URL` | `http://host.docker.internal:7070` |
    /// | `PUBLIC_BASE_URL` | `http://localhost:5000` |
    /// | `HOST_CALLBACK_TOKEN` | `dev-callback-token-change-me` |
    /// | `HEALTHCHECK_INTERVAL_SECS` | `15` |
    /// | `BACKEND_BASE_URL` | `http://host.docker.internal:7860` |
    /// | `GENERATORS_ROOT` | `generators` |
    /// | `MEDIA_ROOT` | `static/generated` |
    /// | `GENERATION_TIMEOUT_SECS` | `7200` |
    /// | `DEFAULT_VIDEO_LENGTH` | `150` |
    /// | `DEFAULT_FPS` | `20` |
    /// | `DEFAULT_WIDTH` | `360` |
    /// | `DEFAULT_HEIGHT` | `640` |
    /// | `REQUEST_TIMEOUT_SECS` | `30` |
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: parse_env("PORT", 5000),
            database_url: env_or("DATABASE_URL", "sqlite://data/vidforge.db?mode=rwc"),
            host_service_url: env_or("HOST_SERVICE_URL", "http://host.docker.internal:7070"),
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:5000"),
            host_callback_token: env_or("HOST_CALLBACK_TOKEN", "dev-callback-token-change-me"),
            healthcheck_interval_secs: parse_env("HEALTHCHECK_INTERVAL_SECS", 15),
            backend_base_url: env_or("BACKEND_BASE_URL", "http://host.docker.internal:7860"),
            generators_root: PathBuf::from(env_or("GENERATORS_ROOT", "generators")),
            media_root: PathBuf::from(env_or("MEDIA_ROOT", "static/generated")),
            generation_timeout_secs: parse_env("GENERATION_TIMEOUT_SECS", 7200),
            default_video_length: parse_env("DEFAULT_VIDEO_LENGTH", 150),
            default_fps: parse_env("DEFAULT_FPS", 20),
            default_width: parse_env("DEFAULT_WIDTH", 360),
            default_height: parse_env("DEFAULT_HEIGHT", 640),
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30),
        }
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(var: &str, default: T) -> T {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{var} must be a valid value")),
        Err(_) => default,
    }
}
