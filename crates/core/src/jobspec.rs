//! Wire-format types for the remote host scheduler.
//!
//! [`JobSpec`] is the JSON body posted to the host service's
//! `/schedule` and `/run-now` endpoints. Field casing follows the host
//! contract exactly: top-level keys are PascalCase, step keys are
//! camelCase. These types are transient; nothing here is persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::DbId;

/// Step name used for the standard orchestrator callback.
const CALLBACK_STEP_NAME: &str = "invoke_orchestrator_callback";

/// Default per-step timeout for generation work (2 hours).
pub const GENERATION_STEP_TIMEOUT_SECS: u64 = 7200;

/// A job submission for the remote host scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(rename = "TaskName")]
    pub task_name: String,
    #[serde(rename = "Steps")]
    pub steps: Vec<JobStep>,
    #[serde(rename = "Env", default)]
    pub env: BTreeMap<String, String>,
    /// `HH:MM` trigger time; required by `/schedule`, absent for `/run-now`.
    #[serde(rename = "Time", skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Capitalized weekday names (e.g. `"Monday"`) for recurring submission.
    #[serde(rename = "Days", default, skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<String>,
}

impl JobSpec {
    /// An immediate (`/run-now`) spec with a single step.
    pub fn run_now(task_name: impl Into<String>, step: JobStep) -> Self {
        Self {
            task_name: task_name.into(),
            steps: vec![step],
            env: BTreeMap::new(),
            time: None,
            days: Vec::new(),
        }
    }

    /// A recurring (`/schedule`) spec with a single step.
    pub fn recurring(
        task_name: impl Into<String>,
        step: JobStep,
        time: impl Into<String>,
        days: Vec<String>,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            steps: vec![step],
            env: BTreeMap::new(),
            time: Some(time.into()),
            days,
        }
    }
}

/// One step of a host job: either a direct docker run or an HTTP
/// callback directive. Exactly one of `docker_args` / `http` is set;
/// HTTP steps additionally carry `type: "http"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStep {
    pub name: String,
    pub timeout_sec: u64,
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_args: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub step_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpDirective>,
}

impl JobStep {
    /// A direct docker execution step.
    pub fn docker(name: impl Into<String>, docker_args: impl Into<String>, timeout_sec: u64) -> Self {
        Self {
            name: name.into(),
            timeout_sec,
            retries: 0,
            docker_args: Some(docker_args.into()),
            step_type: None,
            http: None,
        }
    }

    /// An HTTP callback step.
    pub fn http(name: impl Into<String>, http: HttpDirective, timeout_sec: u64) -> Self {
        Self {
            name: name.into(),
            timeout_sec,
            retries: 0,
            docker_args: None,
            step_type: Some("http".into()),
            http: Some(http),
        }
    }
}

/// The HTTP request a host job step performs at trigger time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDirective {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON payload, pre-serialized as a string per the host contract.
    pub body: String,
    pub content_type: String,
}

/// Body of the host-initiated `POST /api/host/run-job` callback.
///
/// Either `job_id` or `task_name` identifies the job; the remaining
/// fields are informational overrides mirrored from the job row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunJobCallback {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

/// Build the standard single callback step: the host does not run
/// generation code itself, it POSTs back into this service at trigger
/// time with the shared bearer token.
pub fn callback_step(
    public_base_url: &str,
    callback_token: &str,
    payload: &RunJobCallback,
) -> JobStep {
    let url = format!(
        "{}/api/host/run-job",
        public_base_url.trim_end_matches('/')
    );
    let mut headers = BTreeMap::new();
    headers.insert(
        "Authorization".to_string(),
        format!("Bearer {callback_token}"),
    );
    let body = serde_json::to_string(payload).unwrap_or_else(|_| json!({}).to_string());

    JobStep::http(
        CALLBACK_STEP_NAME,
        HttpDirective {
            method: "POST".into(),
            url,
            headers,
            body,
            content_type: "application/json".into(),
        },
        GENERATION_STEP_TIMEOUT_SECS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Wire shape
    // -----------------------------------------------------------------------

    #[test]
    fn job_spec_serializes_pascal_case_top_level() {
        let spec = JobSpec::recurring(
            "vidforge_job_7",
            JobStep::docker("run", "--rm img", 600),
            "09:00",
            vec!["Monday".into(), "Friday".into()],
        );
        let value = serde_json::to_value(&spec).unwrap();

        assert_eq!(value["TaskName"], "vidforge_job_7");
        assert_eq!(value["Time"], "09:00");
        assert_eq!(value["Days"][1], "Friday");
        assert!(value["Env"].is_object());
        assert_eq!(value["Steps"][0]["dockerArgs"], "--rm img");
        assert_eq!(value["Steps"][0]["timeoutSec"], 600);
        assert_eq!(value["Steps"][0]["retries"], 0);
        // Docker steps carry no `type` or `http` keys.
        assert!(value["Steps"][0].get("type").is_none());
        assert!(value["Steps"][0].get("http").is_none());
    }

    #[test]
    fn run_now_spec_omits_time_and_days() {
        let spec = JobSpec::run_now("t", JobStep::docker("s", "", 60));
        let value = serde_json::to_value(&spec).unwrap();
        assert!(value.get("Time").is_none());
        assert!(value.get("Days").is_none());
    }

    #[test]
    fn http_step_carries_type_marker_and_directive() {
        let payload = RunJobCallback {
            job_id: Some(42),
            task_name: Some("vidforge_job_42".into()),
            job_type: Some("dogshow".into()),
            prompt: Some("a dog in a hat".into()),
            ..Default::default()
        };
        let step = callback_step("http://localhost:5000/", "secret", &payload);
        let value = serde_json::to_value(&step).unwrap();

        assert_eq!(value["type"], "http");
        assert_eq!(value["http"]["method"], "POST");
        assert_eq!(value["http"]["url"], "http://localhost:5000/api/host/run-job");
        assert_eq!(value["http"]["contentType"], "application/json");
        assert_eq!(value["http"]["headers"]["Authorization"], "Bearer secret");
        assert_eq!(value["timeoutSec"], GENERATION_STEP_TIMEOUT_SECS);

        // The body is a JSON string whose content round-trips.
        let body: RunJobCallback =
            serde_json::from_str(value["http"]["body"].as_str().unwrap()).unwrap();
        assert_eq!(body.job_id, Some(42));
        assert_eq!(body.job_type.as_deref(), Some("dogshow"));
    }

    #[test]
    fn callback_body_uses_contract_key_names() {
        let payload = RunJobCallback {
            job_id: Some(1),
            job_type: Some("rave".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["jobId"], 1);
        assert_eq!(value["type"], "rave");
        // Unset optionals are omitted entirely.
        assert!(value.get("prompt").is_none());
        assert!(value.get("taskName").is_none());
    }

    #[test]
    fn callback_parses_either_identifier() {
        let by_id: RunJobCallback = serde_json::from_str(r#"{"jobId": 3}"#).unwrap();
        assert_eq!(by_id.job_id, Some(3));
        assert!(by_id.task_name.is_none());

        let by_name: RunJobCallback =
            serde_json::from_str(r#"{"taskName": "vidforge_job_3", "type": "piano"}"#).unwrap();
        assert_eq!(by_name.task_name.as_deref(), Some("vidforge_job_3"));
        assert_eq!(by_name.job_type.as_deref(), Some("piano"));
    }
}
