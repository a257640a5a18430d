//! In-process trigger tasks.
//!
//! Each armed trigger is one lightweight tokio task; tasks are
//! append-only (no handle bookkeeping). Every fire re-reads the job
//! from the store and goes through the dispatcher's check-and-set, so
//! a stale task can never execute a cancelled or already-running job.

use std::time::Duration;

use chrono::{Local, NaiveDateTime, Utc};
use vidforge_core::lifecycle::JobStatus;
use vidforge_core::schedule::{parse_hhmm, weekday_name};
use vidforge_core::types::DbId;
use vidforge_db::models::job::Job;
use vidforge_db::repositories::JobRepo;

use crate::dispatch;
use crate::state::AppState;

/// Recurring trigger poll cadence.
const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Extra sleep after a recurring fire so the same minute cannot match
/// twice.
const POST_FIRE_SLEEP: Duration = Duration::from_secs(60);

/// Arm a one-time trigger: sleep until `schedule_dt`, then fire once.
/// A past timestamp fires immediately.
pub fn arm_one_time(state: AppState, job: &Job) {
    let Some(fire_at) = job.schedule_dt else {
        tracing::warn!(job_id = job.id, "One-time job has no schedule_dt; not arming");
        return;
    };
    let job_id = job.id;
    let task_name = job.task_name.clone();

    tokio::spawn(async move {
        let delay = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tracing::info!(job_id, task_name = %task_name, delay_secs = delay.as_secs(), "One-time trigger armed");
        tokio::time::sleep(delay).await;
        fire(&state, job_id).await;
    });
}

/// Arm a recurring trigger: poll every 30 seconds and fire when the
/// current weekday and minute match the job's schedule. The loop exits
/// when the job disappears or is cancelled.
pub fn arm_recurring(state: AppState, job: &Job) {
    let job_id = job.id;
    let task_name = job.task_name.clone();

    tokio::spawn(async move {
        tracing::info!(job_id, task_name = %task_name, "Recurring trigger armed");
        loop {
            let job = match JobRepo::find_by_id(&state.pool, job_id).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    tracing::info!(job_id, "Job no longer exists; recurring trigger exiting");
                    return;
                }
                Err(e) => {
                    tracing::error!(job_id, error = %e, "Failed to read job; retrying");
                    tokio::time::sleep(POLL_INTERVAL).await;
                    continue;
                }
            };

            if job.lifecycle_status() == JobStatus::Cancelled {
                tracing::info!(job_id, "Job cancelled; recurring trigger exiting");
                return;
            }

            let now = Local::now().naive_local();
            let days = job.recurring_day_names();
            let time = job.recurring_time.as_deref().unwrap_or_default();
            if job.lifecycle_status().can_dispatch() && matches_minute(&days, time, now) {
                fire(&state, job_id).await;
                // Skip past the matched minute before polling again.
                tokio::time::sleep(POST_FIRE_SLEEP).await;
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    });
}

/// One dispatch attempt: re-read the job, claim it, run the generator
/// to completion. Ineligible jobs are skipped silently (the dispatcher
/// logs the refusal).
async fn fire(state: &AppState, job_id: DbId) {
    let job = match JobRepo::find_by_id(&state.pool, job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::warn!(job_id, "Job disappeared before firing");
            return;
        }
        Err(e) => {
            tracing::error!(job_id, error = %e, "Failed to read job at fire time");
            return;
        }
    };

    if !job.lifecycle_status().can_dispatch() {
        tracing::info!(job_id, status = %job.status, "Skipping fire: job not dispatchable");
        return;
    }

    match dispatch::begin(&state.pool, &job).await {
        Ok(Some(run)) => dispatch::finish(state, &job, &run).await,
        Ok(None) => {}
        Err(e) => {
            tracing::error!(job_id, error = %e, "Failed to begin dispatch");
        }
    }
}

/// Whether `now` falls on one of the configured weekdays at exactly the
/// configured `HH:MM` minute.
fn matches_minute(day_names: &[String], hhmm: &str, now: NaiveDateTime) -> bool {
    use chrono::{Datelike, Timelike};

    let Ok((hour, minute)) = parse_hhmm(hhmm) else {
        return false;
    };
    let today = weekday_name(now.weekday());
    day_names.iter().any(|d| d == today)
        && now.hour() == u32::from(hour)
        && now.minute() == u32::from(minute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(date: (i32, u32, u32), hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    // 2024-01-01 was a Monday.
    const MONDAY: (i32, u32, u32) = (2024, 1, 1);
    const TUESDAY: (i32, u32, u32) = (2024, 1, 2);

    #[test]
    fn fires_on_configured_day_and_minute() {
        let days = vec!["monday".to_string(), "friday".to_string()];
        assert!(matches_minute(&days, "09:30", at(MONDAY, 9, 30)));
    }

    #[test]
    fn wrong_day_does_not_fire() {
        let days = vec!["monday".to_string()];
        assert!(!matches_minute(&days, "09:30", at(TUESDAY, 9, 30)));
    }

    #[test]
    fn wrong_minute_does_not_fire() {
        let days = vec!["monday".to_string()];
        assert!(!matches_minute(&days, "09:30", at(MONDAY, 9, 29)));
        assert!(!matches_minute(&days, "09:30", at(MONDAY, 10, 30)));
    }

    #[test]
    fn seconds_within_the_minute_still_match() {
        let days = vec!["monday".to_string()];
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 30, 45)
            .unwrap();
        assert!(matches_minute(&days, "09:30", now));
    }

    #[test]
    fn unparseable_time_never_fires() {
        let days = vec!["monday".to_string()];
        assert!(!matches_minute(&days, "9:3:0", at(MONDAY, 9, 30)));
        assert!(!matches_minute(&days, "", at(MONDAY, 9, 30)));
    }

    #[test]
    fn empty_day_list_never_fires() {
        assert!(!matches_minute(&[], "09:30", at(MONDAY, 9, 30)));
    }
}
