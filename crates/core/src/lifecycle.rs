//! Job and run status vocabulary and the legal-transition table.
//!
//! Statuses are stored as lowercase text in the database; every layer
//! (repositories, scheduler, callback handlers) goes through this module
//! instead of comparing string literals.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`Job`](crate::types::DbId)-keyed job row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::Scheduled,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Database/text representation (lowercase).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Statuses reachable from `self`.
    ///
    /// `Completed` and `Failed` can re-enter `Running` because a
    /// recurring job fires again after a finished run. `Cancelled` is
    /// fully terminal.
    pub fn valid_transitions(self) -> &'static [JobStatus] {
        use JobStatus::*;
        match self {
            Pending => &[Scheduled, Running, Cancelled, Failed],
            Scheduled => &[Running, Cancelled, Failed],
            Running => &[Completed, Failed],
            Completed => &[Running, Cancelled],
            Failed => &[Running, Cancelled],
            Cancelled => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is legal.
    pub fn can_transition(self, to: JobStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Whether a trigger firing right now may start an execution.
    ///
    /// A running job must not be double-dispatched and a cancelled job
    /// must never fire, even if its poll loop is still awake.
    pub fn can_dispatch(self) -> bool {
        !matches!(self, Self::Running | Self::Cancelled)
    }

    /// Whether this status accepts no further transitions at all.
    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "scheduled" => Ok(Self::Scheduled),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("Unknown job status: {other}")),
        }
    }
}

/// Status of a single execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `finished_at` must be set if and only if the run is terminal.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("Unknown run status: {other}")),
        }
    }
}
