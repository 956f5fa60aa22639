//! HTTP transport to the tasking server.

use super::{parse_tasks, IncomingTask, TaskReport};
use crate::config::PollConfig;
use crate::error::{MalsliceError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
struct PayloadBody {
    payload: String,
}

/// Client for the `/tasks` and `/payloads` endpoints.
#[derive(Debug, Clone)]
pub struct TaskClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl TaskClient {
    pub fn new(base_url: impl Into<String>, poll: &PollConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll.request_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tasks_url(&self) -> String {
        format!("{}/tasks/get", self.base_url)
    }

    pub fn payload_url(&self, uuid: &str) -> String {
        format!("{}/payloads/get/{}/bytes", self.base_url, uuid)
    }

    pub fn update_url(&self, uuid: &str) -> String {
        format!("{}/tasks/update/{}", self.base_url, uuid)
    }

    /// Poll for pending tasks. Transport errors propagate; a body that is
    /// not a task list yields an empty list.
    pub async fn fetch_tasks(&self) -> Result<Vec<IncomingTask>> {
        let body = self
            .http_client
            .get(self.tasks_url())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_tasks(&body))
    }

    /// Download and decode the payload of task `uuid`.
    pub async fn fetch_payload(&self, uuid: &str) -> Result<Bytes> {
        let body = self
            .http_client
            .get(self.payload_url(uuid))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        decode_payload(&body)
    }

    /// Submit a completed report.
    pub async fn submit_report(&self, report: &TaskReport) -> Result<()> {
        let response = self
            .http_client
            .post(self.update_url(&report.uuid))
            .json(report)
            .send()
            .await?;
        if let Err(e) = response.error_for_status_ref() {
            error!(task = %report.uuid, error = %e, "Task update rejected");
            return Err(e.into());
        }
        debug!(task = %report.uuid, "Task update accepted");
        Ok(())
    }
}

/// Decode a `{"payload": "<base64>"}` body.
///
/// Empty bodies and bodies mentioning `error` anywhere are treated as fetch
/// failures.
pub fn decode_payload(body: &str) -> Result<Bytes> {
    if body.trim().is_empty() {
        return Err(MalsliceError::PayloadUnavailable("empty payload received".into()));
    }
    if body.contains("error") {
        return Err(MalsliceError::PayloadUnavailable(format!("error in payload: {body}")));
    }
    let parsed: PayloadBody = serde_json::from_str(body)?;
    let bytes = BASE64.decode(parsed.payload.trim())?;
    Ok(Bytes::from(bytes))
}
