//! HTTP client for the host-side task scheduler.
//!
//! The host service owns OS-level scheduled tasks and fires them back
//! into the orchestrator through an authenticated HTTP callback step.
//! This crate speaks its small POST-based wire protocol and classifies
//! every failure so callers can decide between retry, local fallback,
//! and hard error.

mod client;
mod error;

pub use client::{HostClient, RunNowReceipt, ScheduleReceipt};
pub use error::HostError;
