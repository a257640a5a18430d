//! Integration tests for the authenticated host callback endpoint.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json, post_json_auth, TEST_CALLBACK_TOKEN};
use serde_json::json;
use sqlx::SqlitePool;

const CALLBACK_PATH: &str = "/api/host/run-job";

fn bearer() -> String {
    format!("Bearer {TEST_CALLBACK_TOKEN}")
}

async fn create_job(app: axum::Router, task_name: &str) -> i64 {
    let response = post_json(
        app,
        "/api/v1/jobs",
        json!({
            "task_name": task_name,
            "job_type": "dogshow",
            "schedule_kind": "one_time",
            "schedule_dt": "2030-01-01T09:00:00Z",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["job"]["id"].as_i64().unwrap()
}

// ---------------------------------------------------------------------------
// Authentication boundary
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn missing_authorization_returns_401(pool: SqlitePool) {
    let app = common::build_test_app(pool).await;

    let response = post_json(app, CALLBACK_PATH, json!({ "jobId": 1 })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[sqlx::test]
async fn malformed_authorization_returns_401(pool: SqlitePool) {
    let app = common::build_test_app(pool).await;

    let response =
        post_json_auth(app, CALLBACK_PATH, json!({ "jobId": 1 }), "Basic abc123").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
async fn wrong_token_returns_403(pool: SqlitePool) {
    let app = common::build_test_app(pool).await;

    let response = post_json_auth(
        app,
        CALLBACK_PATH,
        json!({ "jobId": 1 }),
        "Bearer wrong-token",
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(json["code"], "FORBIDDEN");
}

// ---------------------------------------------------------------------------
// Job resolution
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn callback_without_identifiers_returns_400(pool: SqlitePool) {
    let app = common::build_test_app(pool).await;

    let response = post_json_auth(app, CALLBACK_PATH, json!({}), &bearer()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test]
async fn callback_with_unknown_job_id_returns_404(pool: SqlitePool) {
    let app = common::build_test_app(pool).await;

    let response = post_json_auth(app, CALLBACK_PATH, json!({ "jobId": 9999 }), &bearer()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test]
async fn callback_with_unknown_task_name_returns_404(pool: SqlitePool) {
    let app = common::build_test_app(pool).await;

    let response = post_json_auth(
        app.clone(),
        CALLBACK_PATH,
        json!({ "taskName": "no_such_task" }),
        &bearer(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // No job was touched.
    let jobs = body_json(get(app, "/api/v1/jobs").await).await;
    assert_eq!(jobs["data"].as_array().unwrap().len(), 0);
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn callback_by_id_starts_a_run(pool: SqlitePool) {
    let app = common::build_test_app(pool).await;
    let id = create_job(app.clone(), "daily_corgi").await;

    let response =
        post_json_auth(app.clone(), CALLBACK_PATH, json!({ "jobId": id }), &bearer()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    let run_id = json["runId"].as_i64().unwrap();
    assert!(run_id > 0);

    // A run row exists; the spawned generator records its own outcome,
    // so the job is past `scheduled` (running, or already failed in the
    // generator-less test environment).
    let runs = body_json(get(app.clone(), &format!("/api/v1/jobs/{id}/runs")).await).await;
    assert_eq!(runs["data"].as_array().unwrap().len(), 1);
    assert_eq!(runs["data"][0]["id"].as_i64().unwrap(), run_id);

    let job = body_json(get(app, &format!("/api/v1/jobs/{id}")).await).await;
    let status = job["data"]["status"].as_str().unwrap();
    assert!(status == "running" || status == "failed", "status was {status}");
}

#[sqlx::test]
async fn callback_by_task_name_resolves_symmetrically(pool: SqlitePool) {
    let app = common::build_test_app(pool).await;
    let id = create_job(app.clone(), "weekly_piano").await;

    let response = post_json_auth(
        app,
        CALLBACK_PATH,
        json!({ "taskName": "weekly_piano" }),
        &bearer(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["runId"].as_i64().unwrap() > 0);
    let _ = id;
}

#[sqlx::test]
async fn callback_against_cancelled_job_returns_409(pool: SqlitePool) {
    let app = common::build_test_app(pool).await;
    let id = create_job(app.clone(), "daily_corgi").await;

    post_json(app.clone(), &format!("/api/v1/jobs/{id}/cancel"), json!({})).await;

    let response = post_json_auth(app, CALLBACK_PATH, json!({ "jobId": id }), &bearer()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
