//! Client for the host scheduler's POST-based wire protocol.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use vidforge_core::jobspec::JobSpec;

use crate::error::HostError;

/// Timeout for schedule/run/delete requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the availability probe. Kept short so health checks and
/// scheduling decisions never stall on a dead host.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Every host endpoint replies with a JSON object carrying a `status`
/// marker plus endpoint-specific fields.
#[derive(Debug, Deserialize)]
struct HostReply {
    status: Option<String>,
    script: Option<String>,
    log: Option<String>,
    #[serde(rename = "exitCode")]
    exit_code: Option<i64>,
}

/// Successful `/schedule` response.
#[derive(Debug, Clone)]
pub struct ScheduleReceipt {
    /// Path of the task script the host materialized, when reported.
    pub script: Option<String>,
}

/// Successful `/run-now` response.
#[derive(Debug, Clone)]
pub struct RunNowReceipt {
    /// Path of the host-side execution log, when reported.
    pub log: Option<String>,
    pub exit_code: Option<i64>,
}

/// Client for the host scheduler service.
#[derive(Debug, Clone)]
pub struct HostClient {
    base_url: String,
    client: reqwest::Client,
}

impl HostClient {
    /// Create a client for the service at `base_url`
    /// (e.g. `http://host.docker.internal:7070`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, HostError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HostError::Connection(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe `GET /health`. Any failure reads as unavailable; this
    /// never returns an error.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Register a recurring task with the host scheduler.
    ///
    /// The wire contract requires a `Time`; a spec without one is
    /// refused here, before any HTTP traffic.
    pub async fn schedule_job(&self, job: &JobSpec) -> Result<ScheduleReceipt, HostError> {
        if job.time.is_none() {
            return Err(HostError::MissingTime);
        }
        tracing::info!(task_name = %job.task_name, time = ?job.time, "Scheduling job on host");
        let reply = self.post("/schedule", job).await?;
        Ok(ScheduleReceipt {
            script: reply.script,
        })
    }

    /// Execute a task immediately on the host. No `Time` required.
    pub async fn run_job_now(&self, job: &JobSpec) -> Result<RunNowReceipt, HostError> {
        tracing::info!(task_name = %job.task_name, "Running job immediately on host");
        let reply = self.post("/run-now", job).await?;
        Ok(RunNowReceipt {
            log: reply.log,
            exit_code: reply.exit_code,
        })
    }

    /// Remove a task from the host scheduler. The host treats deleting
    /// an unknown task as success, so this is idempotent.
    pub async fn delete_task(&self, task_name: &str) -> Result<(), HostError> {
        tracing::info!(task_name, "Deleting task from host scheduler");
        self.post("/delete", &json!({ "TaskName": task_name }))
            .await?;
        Ok(())
    }

    /// POST `body` to `endpoint` and decode the status-marked reply.
    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<HostReply, HostError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(HostError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_reply(&text)
    }
}

/// Decode a reply body and enforce the `status: "ok"` marker.
fn parse_reply(text: &str) -> Result<HostReply, HostError> {
    let reply: HostReply =
        serde_json::from_str(text).map_err(|e| HostError::Protocol(e.to_string()))?;
    match reply.status.as_deref() {
        Some("ok") => Ok(reply),
        Some(_) => Err(HostError::Rejected {
            raw: text.to_string(),
        }),
        None => Err(HostError::Protocol(format!(
            "Response missing status marker: {text}"
        ))),
    }
}
