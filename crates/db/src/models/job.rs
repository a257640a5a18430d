//! Job entity model and DTOs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use vidforge_core::lifecycle::JobStatus;
use vidforge_core::schedule::{self, Recurrence};
use vidforge_core::types::{DbId, Timestamp};

/// How a job's trigger is described: a single instant or a weekly
/// recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    OneTime,
    Recurring,
}

impl ScheduleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneTime => "one_time",
            Self::Recurring => "recurring",
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_time" => Ok(Self::OneTime),
            "recurring" => Ok(Self::Recurring),
            other => Err(format!("Unknown schedule kind: {other}")),
        }
    }
}

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub task_name: String,
    pub job_type: String,
    pub prompt: Option<String>,
    pub character: Option<String>,
    pub environment: Option<String>,
    pub video_length: Option<i64>,
    pub fps: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub schedule_kind: String,
    pub schedule_dt: Option<Timestamp>,
    /// CSV of lowercase weekday names (recurring jobs only).
    pub recurring_days: Option<String>,
    /// `HH:MM` (recurring jobs only).
    pub recurring_time: Option<String>,
    pub status: String,
    pub host_script_path: Option<String>,
    pub host_log_path: Option<String>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Parsed lifecycle status.
    ///
    /// Rows are only ever written through [`JobStatus::as_str`];
    /// unrecognized text is treated as cancelled so a corrupt row can
    /// never dispatch.
    pub fn lifecycle_status(&self) -> JobStatus {
        self.status.parse().unwrap_or(JobStatus::Cancelled)
    }

    /// Parsed schedule kind; unrecognized text reads as one-time,
    /// which arms nothing unless `schedule_dt` is also set.
    pub fn kind(&self) -> ScheduleKind {
        self.schedule_kind.parse().unwrap_or(ScheduleKind::OneTime)
    }

    /// Recurring weekday names, split out of the stored CSV.
    pub fn recurring_day_names(&self) -> Vec<String> {
        self.recurring_days
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect()
    }

    /// Human-readable trigger description for API responses.
    ///
    /// Recurring schedules go through the cron translation (all seven
    /// days collapse to a daily recurrence); `None` when the stored
    /// schedule fields are incomplete.
    pub fn schedule_summary(&self) -> Option<String> {
        match self.kind() {
            ScheduleKind::OneTime => self
                .schedule_dt
                .map(|dt| format!("Once at {}", dt.format("%Y-%m-%d %H:%M UTC"))),
            ScheduleKind::Recurring => {
                let time = self.recurring_time.clone()?;
                let days: Vec<u8> = self
                    .recurring_day_names()
                    .iter()
                    .filter_map(|d| schedule::day_name_to_number(d))
                    .collect();
                let recurrence = if days.len() == 7 {
                    Recurrence::Daily { time }
                } else {
                    Recurrence::Weekly { time, days }
                };
                let cron = recurrence.to_cron().ok()?;
                Some(schedule::describe(&cron))
            }
        }
    }
}

/// Fields for inserting a new job. The row starts in `pending` status.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub task_name: String,
    pub job_type: String,
    pub prompt: Option<String>,
    pub character: Option<String>,
    pub environment: Option<String>,
    pub video_length: Option<i64>,
    pub fps: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub schedule_kind: ScheduleKind,
    pub schedule_dt: Option<Timestamp>,
    pub recurring_days: Option<String>,
    pub recurring_time: Option<String>,
}

/// Partial update for a job's lifecycle fields. `None` fields are left
/// untouched; `updated_at` is always bumped.
#[derive(Debug, Clone, Default)]
pub struct JobStatusUpdate {
    pub status: Option<JobStatus>,
    pub host_script_path: Option<String>,
    pub host_log_path: Option<String>,
    pub last_error: Option<String>,
}

impl JobStatusUpdate {
    /// Shorthand for a bare status change.
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Shorthand for a failure with its error text.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            last_error: Some(error.into()),
            ..Default::default()
        }
    }
}
