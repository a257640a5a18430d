//! Local generator dispatch and the remote/local execution decision.
//!
//! The dispatcher is split into `begin` (guard the job, create the run)
//! and a spawned `finish` (execute, publish, record), so callers —
//! notably the host callback handler — can answer before the generator
//! completes. No error escapes `finish`; every failure lands in the
//! run's `error_message` and the job's `last_error`.

use std::path::PathBuf;
use std::time::Duration;

use vidforge_core::generator::{self, GeneratorError, GeneratorInvocation};
use vidforge_core::lifecycle::JobStatus;
use vidforge_db::models::job::{Job, JobStatusUpdate};
use vidforge_db::models::run::{JobRun, RunOutcome};
use vidforge_db::repositories::{JobRepo, RunRepo};
use vidforge_db::DbPool;

use crate::background::health::HealthState;
use crate::config::ServerConfig;
use crate::state::AppState;

/// Where a trigger executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Hand the work to the remote host scheduler.
    Remote,
    /// Execute in-process via the local scheduler/dispatcher.
    Local,
}

impl ExecutionStrategy {
    /// The single decision point: remote when the host scheduler is
    /// currently reachable, local otherwise.
    pub fn decide(health: &HealthState) -> Self {
        if health.host_available() {
            Self::Remote
        } else {
            Self::Local
        }
    }
}

/// Claim the job for execution and open a run.
///
/// Returns `None` when the check-and-set loses (job already running or
/// cancelled); in that case nothing was written.
pub async fn begin(pool: &DbPool, job: &Job) -> Result<Option<JobRun>, sqlx::Error> {
    if !JobRepo::mark_running(pool, job.id).await? {
        tracing::warn!(
            job_id = job.id,
            task_name = %job.task_name,
            status = %job.status,
            "Dispatch refused: job is not eligible",
        );
        return Ok(None);
    }
    let run = RunRepo::create(pool, job.id).await?;
    tracing::info!(job_id = job.id, run_id = run.id, "Dispatch started");
    Ok(Some(run))
}

/// Execute the generator for an already-claimed job on a spawned task.
pub fn spawn_finish(state: AppState, job: Job, run: JobRun) {
    tokio::spawn(async move {
        finish(&state, &job, &run).await;
    });
}

/// Run the generator, publish its artifact, and record the outcome on
/// both the run and the job.
pub async fn finish(state: &AppState, job: &Job, run: &JobRun) {
    let outcome = execute(state, job).await;

    let job_update = match &outcome {
        RunOutcome {
            error_message: None,
            ..
        } => JobStatusUpdate::status(JobStatus::Completed),
        RunOutcome {
            error_message: Some(err),
            ..
        } => JobStatusUpdate::failed(err.clone()),
    };

    match RunRepo::complete(&state.pool, run.id, &outcome).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(run_id = run.id, "Run was already finalized; outcome dropped");
        }
        Err(e) => {
            tracing::error!(run_id = run.id, error = %e, "Failed to record run outcome");
        }
    }
    match JobRepo::update_status(&state.pool, job.id, &job_update).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(job_id = job.id, "Job outcome refused by the lifecycle guard");
        }
        Err(e) => {
            tracing::error!(job_id = job.id, error = %e, "Failed to record job outcome");
        }
    }

    match &outcome.error_message {
        None => tracing::info!(
            job_id = job.id,
            run_id = run.id,
            output = ?outcome.output_path,
            "Generation completed",
        ),
        Some(err) => tracing::error!(
            job_id = job.id,
            run_id = run.id,
            error = %err,
            "Generation failed",
        ),
    }
}

/// Run the generator subprocess and resolve its artifact.
async fn execute(state: &AppState, job: &Job) -> RunOutcome {
    let invocation = build_invocation(&state.config, job);
    tracing::info!(
        job_id = job.id,
        job_type = %job.job_type,
        cwd = ?invocation.working_directory,
        "Starting generator",
    );

    match generator::run(&invocation).await {
        Ok(output) => {
            tracing::debug!(
                job_id = job.id,
                duration_ms = output.duration_ms,
                "Generator exited cleanly",
            );
            resolve_artifact(state, job)
        }
        Err(GeneratorError::ExecutionFailed { exit_code, stderr }) => RunOutcome::failed(
            format!("Generator exited with code {exit_code}: {stderr}"),
            Some(exit_code as i64),
        ),
        Err(e @ GeneratorError::Timeout { .. }) => RunOutcome::failed(e.to_string(), None),
        Err(GeneratorError::Io(e)) => {
            RunOutcome::failed(format!("Failed to start generator: {e}"), None)
        }
    }
}

/// Locate the newest media file the generator produced and copy it into
/// the served media root.
fn resolve_artifact(state: &AppState, job: &Job) -> RunOutcome {
    let out_dir = generator_dir(&state.config, job).join("output");
    let artifact = match generator::newest_media_file(&out_dir) {
        Ok(Some(path)) => path,
        Ok(None) => {
            return RunOutcome::failed(
                format!("Generator produced no media output in {}", out_dir.display()),
                Some(0),
            );
        }
        Err(e) => {
            return RunOutcome::failed(format!("Failed to scan generator output: {e}"), Some(0));
        }
    };

    match generator::publish_artifact(&artifact, &state.config.media_root, &job.task_name) {
        Ok(dest) => RunOutcome::completed(dest.display().to_string()),
        Err(e) => RunOutcome::failed(format!("Failed to publish artifact: {e}"), Some(0)),
    }
}

/// Directory of the generator handling this job's type.
fn generator_dir(config: &ServerConfig, job: &Job) -> PathBuf {
    config.generators_root.join(&job.job_type)
}

/// Build the subprocess invocation for a job.
///
/// Job text fields and generation parameters travel as environment
/// variables; parameters fall back to the configured defaults.
pub fn build_invocation(config: &ServerConfig, job: &Job) -> GeneratorInvocation {
    let mut env_vars = vec![(
        "SD_BASE_URL".to_string(),
        config.backend_base_url.clone(),
    )];
    if let Some(prompt) = &job.prompt {
        env_vars.push(("GEN_PROMPT".to_string(), prompt.clone()));
    }
    if let Some(character) = &job.character {
        env_vars.push(("GEN_CHARACTER".to_string(), character.clone()));
    }
    if let Some(environment) = &job.environment {
        env_vars.push(("GEN_ENVIRONMENT".to_string(), environment.clone()));
    }
    env_vars.push((
        "GEN_VIDEO_LENGTH".to_string(),
        job.video_length.unwrap_or(config.default_video_length).to_string(),
    ));
    env_vars.push((
        "GEN_FPS".to_string(),
        job.fps.unwrap_or(config.default_fps).to_string(),
    ));
    env_vars.push((
        "GEN_WIDTH".to_string(),
        job.width.unwrap_or(config.default_width).to_string(),
    ));
    env_vars.push((
        "GEN_HEIGHT".to_string(),
        job.height.unwrap_or(config.default_height).to_string(),
    ));

    GeneratorInvocation {
        program: "python3".to_string(),
        args: vec!["call.py".to_string()],
        working_directory: Some(generator_dir(config, job)),
        env_vars,
        timeout: Duration::from_secs(config.generation_timeout_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: "sqlite::memory:".into(),
            host_service_url: "http://localhost:7070".into(),
            public_base_url: "http://localhost:5000".into(),
            host_callback_token: "test-token".into(),
            healthcheck_interval_secs: 15,
            backend_base_url: "http://localhost:7860".into(),
            generators_root: "generators".into(),
            media_root: "static/generated".into(),
            generation_timeout_secs: 7200,
            default_video_length: 150,
            default_fps: 20,
            default_width: 360,
            default_height: 640,
            request_timeout_secs: 30,
        }
    }

    fn test_job() -> Job {
        Job {
            id: 1,
            task_name: "vidforge_job_1".into(),
            job_type: "dogshow".into(),
            prompt: Some("a corgi".into()),
            character: None,
            environment: None,
            video_length: Some(90),
            fps: None,
            width: None,
            height: None,
            schedule_kind: "one_time".into(),
            schedule_dt: Some(Utc::now()),
            recurring_days: None,
            recurring_time: None,
            status: "pending".into(),
            host_script_path: None,
            host_log_path: None,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    // --- strategy -------------------------------------------------------

    #[test]
    fn strategy_is_remote_only_when_host_is_up() {
        let health = HealthState::default();
        assert_eq!(ExecutionStrategy::decide(&health), ExecutionStrategy::Local);

        health.set_host_available(true);
        assert_eq!(ExecutionStrategy::decide(&health), ExecutionStrategy::Remote);

        // Backend availability does not affect the decision.
        health.set_host_available(false);
        health.set_backend_available(true);
        assert_eq!(ExecutionStrategy::decide(&health), ExecutionStrategy::Local);
    }

    // --- invocation -----------------------------------------------------

    #[test]
    fn invocation_targets_generator_directory() {
        let invocation = build_invocation(&test_config(), &test_job());

        assert_eq!(invocation.program, "python3");
        assert_eq!(invocation.args, vec!["call.py".to_string()]);
        assert_eq!(
            invocation.working_directory,
            Some(PathBuf::from("generators/dogshow"))
        );
        assert_eq!(invocation.timeout, Duration::from_secs(7200));
    }

    #[test]
    fn invocation_env_carries_params_and_defaults() {
        let invocation = build_invocation(&test_config(), &test_job());
        let env: std::collections::HashMap<_, _> = invocation.env_vars.into_iter().collect();

        assert_eq!(env.get("GEN_PROMPT").map(String::as_str), Some("a corgi"));
        // Explicit value wins over the default.
        assert_eq!(env.get("GEN_VIDEO_LENGTH").map(String::as_str), Some("90"));
        // Unset parameters fall back to config defaults.
        assert_eq!(env.get("GEN_FPS").map(String::as_str), Some("20"));
        assert_eq!(env.get("GEN_WIDTH").map(String::as_str), Some("360"));
        assert_eq!(env.get("GEN_HEIGHT").map(String::as_str), Some("640"));
        // Unset text fields are omitted entirely.
        assert!(!env.contains_key("GEN_CHARACTER"));
        assert_eq!(
            env.get("SD_BASE_URL").map(String::as_str),
            Some("http://localhost:7860")
        );
    }
}
