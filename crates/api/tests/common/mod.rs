use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderName, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use vidforge_api::background::health::HealthState;
use vidforge_api::config::ServerConfig;
use vidforge_api::routes;
use vidforge_api::state::AppState;
use vidforge_host::HostClient;

/// Token used by the test config and the callback tests.
pub const TEST_CALLBACK_TOKEN: &str = "test-callback-token";

/// Build a test `ServerConfig` with safe defaults.
///
/// The host service URL is unroutable (TEST-NET-1) so any accidental
/// remote call fails fast instead of leaving the process.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        host_service_url: "http://192.0.2.1:7070".to_string(),
        public_base_url: "http://localhost:5000".to_string(),
        host_callback_token: TEST_CALLBACK_TOKEN.to_string(),
        healthcheck_interval_secs: 15,
        backend_base_url: "http://192.0.2.1:7860".to_string(),
        generators_root: "generators".into(),
        media_root: "static/generated".into(),
        generation_timeout_secs: 10,
        default_video_length: 150,
        default_fps: 20,
        default_width: 360,
        default_height: 640,
        request_timeout_secs: 30,
    }
}

/// Build the application state directly, for tests that drive the
/// scheduler or dispatcher without going through the router.
pub fn build_test_state(pool: SqlitePool, config: ServerConfig) -> AppState {
    let host = Arc::new(HostClient::new(config.host_service_url.clone()).unwrap());
    AppState {
        pool,
        config: Arc::new(config),
        host,
        health: Arc::new(HealthState::default()),
    }
}

/// Build the full application router with all middleware layers, using
/// the given database pool and the default test config.
pub async fn build_test_app(pool: SqlitePool) -> Router {
    build_test_app_with_config(pool, test_config()).await
}

/// Build the full application router with all middleware layers.
///
/// This mirrors the router construction in `main.rs` so integration
/// tests exercise the same middleware stack (request ID, timeout,
/// tracing, panic recovery) that production uses. The health monitor is
/// not started; `HealthState` stays at its all-unavailable default, so
/// every scheduling decision resolves to local execution.
pub async fn build_test_app_with_config(pool: SqlitePool, config: ServerConfig) -> Router {
    vidforge_db::run_migrations(&pool)
        .await
        .expect("migrations failed");

    let state = build_test_state(pool, config);

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .merge(routes::host_callback::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}

/// Send a GET request to the app.
pub async fn get(app: Router, path: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, path: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body and an `Authorization` header.
pub async fn post_json_auth(
    app: Router,
    path: &str,
    body: serde_json::Value,
    authorization: &str,
) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .header("authorization", authorization)
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
