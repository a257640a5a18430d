//! Scheduling policy: where a job's trigger lives and how it is armed.
//!
//! One-time triggers always arm locally; the host wire contract has no
//! date field, only a weekly time/days pair. Recurring triggers go to
//! the remote host scheduler when it is reachable, otherwise to the
//! local poll loop. The store is the source of truth; armed tasks are a
//! rebuilt view, re-created from persisted rows at startup.

pub mod local;

use vidforge_core::jobspec::{self, JobSpec, RunJobCallback};
use vidforge_core::lifecycle::JobStatus;
use vidforge_core::schedule::host_day_name;
use vidforge_db::models::job::{Job, JobStatusUpdate, ScheduleKind};
use vidforge_db::repositories::JobRepo;
use vidforge_host::HostError;

use crate::dispatch::{self, ExecutionStrategy};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// How a trigger ended up armed, reported back to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmedVia {
    HostScheduler,
    LocalScheduler,
}

/// Arm the trigger for a freshly created job and mark it `scheduled`.
///
/// On host rejection the job moves to `failed` with `last_error` set
/// and the error propagates; on host unreachability the trigger falls
/// back to the local scheduler instead of failing.
pub async fn schedule_new_job(state: &AppState, job: &Job) -> AppResult<ArmedVia> {
    match job.kind() {
        ScheduleKind::OneTime => {
            mark_scheduled(state, job).await?;
            local::arm_one_time(state.clone(), job);
            Ok(ArmedVia::LocalScheduler)
        }
        ScheduleKind::Recurring => match ExecutionStrategy::decide(&state.health) {
            ExecutionStrategy::Remote => schedule_on_host(state, job).await,
            ExecutionStrategy::Local => arm_recurring_locally(state, job).await,
        },
    }
}

/// Record `scheduled` before the trigger task exists. A past-due
/// trigger can fire the moment it is armed; writing first means its
/// `running` status can never be overwritten by this path (the guarded
/// update refuses the write anyway).
async fn mark_scheduled(state: &AppState, job: &Job) -> AppResult<()> {
    let applied = JobRepo::update_status(
        &state.pool,
        job.id,
        &JobStatusUpdate::status(JobStatus::Scheduled),
    )
    .await?;
    if !applied {
        tracing::warn!(
            job_id = job.id,
            task_name = %job.task_name,
            "Job left its schedulable status before arming; keeping the stored status",
        );
    }
    Ok(())
}

/// Register a recurring job with the remote host scheduler.
async fn schedule_on_host(state: &AppState, job: &Job) -> AppResult<ArmedVia> {
    let spec = build_host_spec(state, job);
    match state.host.schedule_job(&spec).await {
        Ok(receipt) => {
            let update = JobStatusUpdate {
                status: Some(JobStatus::Scheduled),
                host_script_path: receipt.script,
                ..Default::default()
            };
            if !JobRepo::update_status(&state.pool, job.id, &update).await? {
                tracing::warn!(
                    job_id = job.id,
                    "Job changed status while the host accepted it; keeping the stored status",
                );
            }
            tracing::info!(job_id = job.id, task_name = %job.task_name, "Job scheduled on host");
            Ok(ArmedVia::HostScheduler)
        }
        // Unreachable host: fall back to the local poll loop.
        Err(e @ (HostError::Connection(_) | HostError::Timeout)) => {
            tracing::warn!(
                job_id = job.id,
                error = %e,
                "Host scheduler unreachable, falling back to local scheduling",
            );
            arm_recurring_locally(state, job).await
        }
        // The host refused (or misbehaved): the job is failed with the
        // error recorded, and the caller sees the rejection.
        Err(e) => {
            JobRepo::update_status(&state.pool, job.id, &JobStatusUpdate::failed(e.to_string()))
                .await?;
            Err(AppError::Host(e))
        }
    }
}

async fn arm_recurring_locally(state: &AppState, job: &Job) -> AppResult<ArmedVia> {
    mark_scheduled(state, job).await?;
    local::arm_recurring(state.clone(), job);
    Ok(ArmedVia::LocalScheduler)
}

/// Trigger an immediate execution, remote when the host is up.
///
/// Remote: the host runs the job's callback step, which re-enters this
/// service through `/api/host/run-job`; only `host_log_path` is
/// recorded here. Local: the dispatcher claims the job and spawns the
/// generator directly.
pub async fn run_now(state: &AppState, job: &Job) -> AppResult<ArmedVia> {
    match ExecutionStrategy::decide(&state.health) {
        ExecutionStrategy::Remote => {
            let mut spec = build_host_spec(state, job);
            spec.time = None;
            spec.days.clear();
            match state.host.run_job_now(&spec).await {
                Ok(receipt) => {
                    if receipt.log.is_some() {
                        let update = JobStatusUpdate {
                            host_log_path: receipt.log,
                            ..Default::default()
                        };
                        JobRepo::update_status(&state.pool, job.id, &update).await?;
                    }
                    Ok(ArmedVia::HostScheduler)
                }
                Err(e @ (HostError::Connection(_) | HostError::Timeout)) => {
                    tracing::warn!(
                        job_id = job.id,
                        error = %e,
                        "Host scheduler unreachable, running locally",
                    );
                    dispatch_locally(state, job).await
                }
                Err(e) => {
                    JobRepo::update_status(
                        &state.pool,
                        job.id,
                        &JobStatusUpdate::failed(e.to_string()),
                    )
                    .await?;
                    Err(AppError::Host(e))
                }
            }
        }
        ExecutionStrategy::Local => dispatch_locally(state, job).await,
    }
}

async fn dispatch_locally(state: &AppState, job: &Job) -> AppResult<ArmedVia> {
    let run = dispatch::begin(&state.pool, job)
        .await?
        .ok_or_else(|| {
            AppError::Core(vidforge_core::error::CoreError::Conflict(format!(
                "Job {} is not eligible to run (status {})",
                job.id, job.status
            )))
        })?;
    dispatch::spawn_finish(state.clone(), job.clone(), run);
    Ok(ArmedVia::LocalScheduler)
}

/// Build the host-wire job spec for a job: a single HTTP callback step
/// that re-enters this service with the shared bearer token.
pub fn build_host_spec(state: &AppState, job: &Job) -> JobSpec {
    let payload = RunJobCallback {
        job_id: Some(job.id),
        task_name: Some(job.task_name.clone()),
        job_type: Some(job.job_type.clone()),
        prompt: job.prompt.clone(),
        character: job.character.clone(),
        environment: job.environment.clone(),
    };
    let step = jobspec::callback_step(
        &state.config.public_base_url,
        &state.config.host_callback_token,
        &payload,
    );

    let days: Vec<String> = job
        .recurring_day_names()
        .iter()
        .filter_map(|d| host_day_name(d))
        .map(str::to_string)
        .collect();

    JobSpec {
        task_name: job.task_name.clone(),
        steps: vec![step],
        env: Default::default(),
        time: job.recurring_time.clone(),
        days,
    }
}

/// Re-arm triggers for persisted jobs after a restart.
///
/// Jobs delegated to the host scheduler (a `host_script_path` is
/// recorded) stay with the host. One-time jobs still pending or
/// scheduled get a fresh sleep task; recurring jobs are re-armed from
/// any status short of cancelled, because between fires they sit at
/// `completed` or `failed` yet still own a future trigger.
pub async fn rearm_persisted_jobs(state: &AppState) -> Result<usize, sqlx::Error> {
    let jobs = JobRepo::list_by_status(
        &state.pool,
        &[
            JobStatus::Pending,
            JobStatus::Scheduled,
            JobStatus::Completed,
            JobStatus::Failed,
        ],
    )
    .await?;

    let mut armed = 0;
    for job in &jobs {
        match job.kind() {
            ScheduleKind::OneTime => {
                // A finished one-time job has no future trigger.
                if !matches!(
                    job.lifecycle_status(),
                    JobStatus::Pending | JobStatus::Scheduled
                ) {
                    continue;
                }
                local::arm_one_time(state.clone(), job);
                armed += 1;
            }
            ScheduleKind::Recurring => {
                if job.host_script_path.is_some() {
                    tracing::debug!(
                        job_id = job.id,
                        task_name = %job.task_name,
                        "Job remains delegated to host scheduler",
                    );
                    continue;
                }
                local::arm_recurring(state.clone(), job);
                armed += 1;
            }
        }
    }

    tracing::info!(total = jobs.len(), armed, "Re-armed persisted jobs");
    Ok(armed)
}
