//! Task orchestration: poll, fetch, scan, report.
//!
//! Tasks are handled strictly one at a time. Scanning runs on the blocking
//! pool because every detector call spawns and waits on a child process.

use super::{IncomingTask, TaskClient, TaskReport};
use crate::config::{AgentConfig, ScanConfig};
use crate::error::{MalsliceError, Result};
use crate::oracle::{BufferScanner, Detector};
use crate::scan::{scan_payload_chunked, scan_payload_thorough, ResultCode, ScanResult};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

pub type SharedDetector = Arc<dyn Detector + Send + Sync>;
pub type SharedBufferScanner = Arc<dyn BufferScanner + Send + Sync>;

/// Run the detector drivers for one payload according to the task flags.
///
/// Thorough mode falls back to a chunked pass over the full payload when it
/// reports `NotDetected`.
pub fn run_defender_scan<D: Detector + ?Sized>(
    task: &IncomingTask,
    payload: &Bytes,
    detector: &D,
    scan: &ScanConfig,
) -> Result<ScanResult> {
    if task.enable_thorough_defender {
        let thorough =
            scan_payload_thorough(detector, payload, scan.thorough_step, scan.max_regions)?;
        if thorough.result_code != ResultCode::NotDetected {
            return Ok(thorough);
        }
        info!("Thorough scan found no region, falling back to chunked scan");
    }
    scan_payload_chunked(detector, payload, scan.default_step)
}

/// Scan `payload` with both oracles and assemble the report for `task`.
pub fn analyze_payload<D, B>(
    task: &IncomingTask,
    payload: &Bytes,
    detector: &D,
    buffer_scanner: &B,
    scan: &ScanConfig,
) -> Result<TaskReport>
where
    D: Detector + ?Sized,
    B: BufferScanner + ?Sized,
{
    verify_sha256(task, payload);

    let defender = run_defender_scan(task, payload, detector, scan)?;
    info!(
        threats = %defender.threat_names.as_slice().join(", "),
        result = %defender.result_code,
        regions = defender.regions.len(),
        "Defender scan complete"
    );

    let amsi = buffer_scanner.scan_buffer(payload);
    info!(result = %amsi, "AMSI scan complete");

    Ok(TaskReport::completed(
        task,
        defender,
        amsi,
        chrono::Utc::now().timestamp(),
    ))
}

/// Compare the payload digest with the task's advertised SHA-256.
/// A mismatch is logged only.
pub fn verify_sha256(task: &IncomingTask, payload: &[u8]) -> bool {
    let digest = hex::encode(Sha256::digest(payload));
    if task.file_sha256.is_empty() || digest.eq_ignore_ascii_case(task.file_sha256.trim()) {
        return true;
    }
    warn!(
        expected = %task.file_sha256,
        actual = %digest,
        "Payload SHA-256 does not match task"
    );
    false
}

/// The agent loop.
pub struct Orchestrator {
    client: TaskClient,
    detector: SharedDetector,
    buffer_scanner: SharedBufferScanner,
    config: AgentConfig,
}

impl Orchestrator {
    pub fn new(
        client: TaskClient,
        detector: SharedDetector,
        buffer_scanner: SharedBufferScanner,
        config: AgentConfig,
    ) -> Self {
        Self {
            client,
            detector,
            buffer_scanner,
            config,
        }
    }

    /// Poll forever. Transport errors are logged and followed by a backoff.
    pub async fn run(&self) {
        let idle = Duration::from_secs(self.config.poll.idle_delay_secs);
        let backoff = Duration::from_secs(self.config.poll.error_backoff_secs);
        info!(server = %self.client.base_url(), "Polling for tasks");

        loop {
            match self.poll_once().await {
                Ok(0) => tokio::time::sleep(idle).await,
                Ok(_) => tokio::time::sleep(backoff).await,
                Err(e) => {
                    error!(error = %e, "Failed to get tasks");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Fetch one batch and process every task in it. Returns the batch size.
    pub async fn poll_once(&self) -> Result<usize> {
        let tasks = self.client.fetch_tasks().await?;
        for task in &tasks {
            if task.file_name.is_empty() {
                error!(task = %task.uuid, "Task has no file name");
                continue;
            }
            match self.process_task(task).await {
                Ok(()) => info!(task = %task.uuid, "Task processed successfully"),
                Err(e) => error!(task = %task.uuid, error = %e, "Task failed to process"),
            }
        }
        Ok(tasks.len())
    }

    /// Fetch, scan and report a single task.
    ///
    /// A failed payload fetch aborts the task without contacting the update
    /// endpoint; the server is left to time the task out.
    pub async fn process_task(&self, task: &IncomingTask) -> Result<()> {
        let span = info_span!(
            "task",
            task = %task.uuid,
            file = %task.file_name,
            thorough = task.enable_thorough_defender
        );

        async {
            let payload = self.client.fetch_payload(&task.uuid).await?;
            info!(len = payload.len(), "Got payload");

            let detector = Arc::clone(&self.detector);
            let buffer_scanner = Arc::clone(&self.buffer_scanner);
            let scan = self.config.scan.clone();
            let owned_task = task.clone();
            let current = tracing::Span::current();

            let report = tokio::task::spawn_blocking(move || {
                let _guard = current.enter();
                analyze_payload(&owned_task, &payload, &*detector, &*buffer_scanner, &scan)
            })
            .await
            .map_err(|e| MalsliceError::Internal(format!("scan task panicked: {e}")))??;

            self.client.submit_report(&report).await
        }
        .instrument(span)
        .await
    }
}
