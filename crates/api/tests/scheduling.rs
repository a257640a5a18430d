//! Scheduler integration: startup re-arming and an armed trigger
//! firing all the way through the dispatcher.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use chrono::{Duration as ChronoDuration, Utc};
use common::{body_json, post_json};
use serde_json::json;
use sqlx::SqlitePool;
use vidforge_api::scheduler;
use vidforge_core::lifecycle::{JobStatus, RunStatus};
use vidforge_db::models::job::{JobStatusUpdate, NewJob, ScheduleKind};
use vidforge_db::models::run::JobRun;
use vidforge_db::repositories::{JobRepo, RunRepo};

fn recurring_job(task_name: &str) -> NewJob {
    NewJob {
        task_name: task_name.to_string(),
        job_type: "dogshow".to_string(),
        prompt: None,
        character: None,
        environment: None,
        video_length: None,
        fps: None,
        width: None,
        height: None,
        schedule_kind: ScheduleKind::Recurring,
        schedule_dt: None,
        recurring_days: Some("monday,friday".to_string()),
        recurring_time: Some("09:30".to_string()),
    }
}

fn one_time_job(task_name: &str) -> NewJob {
    NewJob {
        schedule_kind: ScheduleKind::OneTime,
        schedule_dt: Some(Utc::now() + ChronoDuration::hours(1)),
        recurring_days: None,
        recurring_time: None,
        ..recurring_job(task_name)
    }
}

// ---------------------------------------------------------------------------
// Startup re-arming
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn restart_rearms_recurring_job_that_already_fired(pool: SqlitePool) {
    vidforge_db::run_migrations(&pool).await.unwrap();
    let state = common::build_test_state(pool.clone(), common::test_config());

    // The job fired once and finished before the restart; between fires
    // it sits at `completed` but still owns a future trigger.
    let job = JobRepo::create(&pool, &recurring_job("weekly_report")).await.unwrap();
    assert!(JobRepo::mark_running(&pool, job.id).await.unwrap());
    assert!(
        JobRepo::update_status(&pool, job.id, &JobStatusUpdate::status(JobStatus::Completed))
            .await
            .unwrap()
    );

    let armed = scheduler::rearm_persisted_jobs(&state).await.unwrap();
    assert_eq!(armed, 1);
}

#[sqlx::test]
async fn restart_skips_jobs_without_a_future_trigger(pool: SqlitePool) {
    vidforge_db::run_migrations(&pool).await.unwrap();
    let state = common::build_test_state(pool.clone(), common::test_config());

    // A finished one-time job is done for good.
    let done = JobRepo::create(&pool, &one_time_job("ran_once")).await.unwrap();
    assert!(JobRepo::mark_running(&pool, done.id).await.unwrap());
    assert!(
        JobRepo::update_status(&pool, done.id, &JobStatusUpdate::status(JobStatus::Completed))
            .await
            .unwrap()
    );

    // A host-delegated recurring job stays with the host scheduler.
    let delegated = JobRepo::create(&pool, &recurring_job("on_host")).await.unwrap();
    let update = JobStatusUpdate {
        status: Some(JobStatus::Scheduled),
        host_script_path: Some("/tasks/on_host.sh".to_string()),
        ..Default::default()
    };
    assert!(JobRepo::update_status(&pool, delegated.id, &update).await.unwrap());

    // A cancelled job never comes back.
    let cancelled = JobRepo::create(&pool, &recurring_job("gone")).await.unwrap();
    assert!(JobRepo::cancel(&pool, cancelled.id).await.unwrap());

    let armed = scheduler::rearm_persisted_jobs(&state).await.unwrap();
    assert_eq!(armed, 0);
}

// ---------------------------------------------------------------------------
// A trigger firing end to end
// ---------------------------------------------------------------------------

async fn wait_for_finished_run(pool: &SqlitePool, job_id: i64) -> JobRun {
    for _ in 0..100 {
        let runs = RunRepo::list_for_job(pool, job_id, None).await.unwrap();
        if let Some(run) = runs.into_iter().find(|r| r.finished_at.is_some()) {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("no finished run for job {job_id}");
}

#[sqlx::test]
async fn past_due_one_time_job_fires_and_publishes_artifact(pool: SqlitePool) {
    let workdir = tempfile::tempdir().unwrap();
    let gen_dir = workdir.path().join("generators").join("clipgen");
    std::fs::create_dir_all(&gen_dir).unwrap();
    std::fs::write(
        gen_dir.join("call.py"),
        "import os\n\
         os.makedirs('output', exist_ok=True)\n\
         open('output/clip.mp4', 'wb').write(b'fake video bytes')\n",
    )
    .unwrap();

    let mut config = common::test_config();
    config.generators_root = workdir.path().join("generators");
    config.media_root = workdir.path().join("media");
    let media_root = config.media_root.clone();
    let app = common::build_test_app_with_config(pool.clone(), config).await;

    let response = post_json(
        app,
        "/api/v1/jobs",
        json!({
            "task_name": "fires_now",
            "job_type": "clipgen",
            "prompt": "a fox",
            "schedule_kind": "one_time",
            "schedule_dt": (Utc::now() - ChronoDuration::seconds(5)).to_rfc3339(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let job_id = body_json(response).await["data"]["job"]["id"].as_i64().unwrap();

    // The trigger is past due, so the armed task fires immediately.
    let run = wait_for_finished_run(&pool, job_id).await;
    assert_eq!(
        run.lifecycle_status(),
        RunStatus::Completed,
        "run failed: {:?}",
        run.error_message,
    );

    let output = run.output_path.expect("completed run records its artifact");
    assert!(output.ends_with(".mp4"));
    let output = std::path::PathBuf::from(output);
    assert!(output.starts_with(&media_root));
    assert_eq!(std::fs::read(&output).unwrap(), b"fake video bytes");

    let job = JobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.lifecycle_status(), JobStatus::Completed);
}
