//! Tasking wire models and the agent loop.
//!
//! - [`client::TaskClient`] talks to the tasking server over HTTP.
//! - [`orchestrator::Orchestrator`] turns one task into one report.

pub mod client;
pub mod orchestrator;

pub use client::TaskClient;
pub use orchestrator::Orchestrator;

use crate::oracle::AmsiVerdict;
use crate::scan::{ResultCode, ScanResult};
use serde::{Deserialize, Serialize};

/// Status literal sent back for a processed task.
pub const TASK_STATUS_COMPLETED: &str = "Completed";

/// A task as returned by `GET /tasks/get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomingTask {
    pub uuid: String,
    pub task_status: String,
    pub time_sent: i64,
    pub time_updated: i64,
    pub file_sha256: String,
    pub file_name: String,
    pub enable_static_analysis: bool,
    pub enable_dynamic_analysis: bool,
    pub enable_thorough_defender: bool,
}

impl Default for IncomingTask {
    fn default() -> Self {
        Self {
            uuid: String::new(),
            task_status: "Pending".to_string(),
            time_sent: 0,
            time_updated: 0,
            file_sha256: String::new(),
            file_name: String::new(),
            enable_static_analysis: true,
            enable_dynamic_analysis: false,
            enable_thorough_defender: false,
        }
    }
}

/// Body of `POST /tasks/update/{uuid}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub uuid: String,
    pub task_status: String,
    pub time_sent: i64,
    pub time_updated: i64,
    pub file_sha256: String,
    pub file_name: String,
    pub enable_thorough_defender: bool,
    pub amsi_result: AmsiVerdict,
    pub defender_result: ResultCode,
    pub defender_threats: Vec<String>,
    #[serde(rename = "0_x_base64_malicious_bytes")]
    pub zero_x_base64_malicious_bytes: String,
    #[serde(rename = "x_y_base64_malicious_bytes")]
    pub x_y_base64_malicious_bytes: String,
    pub list_of_base64_malicious_bytes: Vec<String>,
}

impl TaskReport {
    /// Assemble a completed report for `task`.
    pub fn completed(
        task: &IncomingTask,
        scan: ScanResult,
        amsi: AmsiVerdict,
        time_updated: i64,
    ) -> Self {
        Self {
            uuid: task.uuid.clone(),
            task_status: TASK_STATUS_COMPLETED.to_string(),
            time_sent: task.time_sent,
            time_updated,
            file_sha256: task.file_sha256.clone(),
            file_name: task.file_name.clone(),
            enable_thorough_defender: task.enable_thorough_defender,
            amsi_result: amsi,
            defender_result: scan.result_code,
            zero_x_base64_malicious_bytes: scan.zero_x_base64(),
            x_y_base64_malicious_bytes: scan.near_boundary_base64(),
            list_of_base64_malicious_bytes: scan.regions_base64(),
            defender_threats: scan.threat_names.into_vec(),
        }
    }
}

/// Parse a `/tasks/get` body. Malformed JSON is logged and yields no tasks.
pub fn parse_tasks(body: &str) -> Vec<IncomingTask> {
    match serde_json::from_str::<Vec<IncomingTask>>(body) {
        Ok(tasks) => tasks,
        Err(e) => {
            tracing::error!(error = %e, "Failed to deserialize task list");
            Vec::new()
        }
    }
}
