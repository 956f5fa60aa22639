//! Command-line detector: runs an external AV scanner against a file.
//!
//! Exit status `0` means clean, `2` means a threat was found, anything else
//! is an error. The threat name is lifted from the stdout line carrying the
//! configured marker.

use super::{Detector, ScanClassification};
use crate::config::DetectorConfig;
use crate::error::MalsliceError;
use crate::timeout::{wait_with_timeout, TimeoutConfig};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

const EXIT_NOT_DETECTED: i32 = 0;
const EXIT_THREAT_DETECTED: i32 = 2;

/// Detector backed by an external scanner executable.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    config: DetectorConfig,
}

impl CommandDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn timeout_config(&self) -> TimeoutConfig {
        TimeoutConfig::new(self.config.timeout_secs, "detector scan")
            .with_poll_interval(Duration::from_millis(self.config.poll_interval_ms.max(1)))
    }
}

impl Detector for CommandDetector {
    fn scan_file(&self, path: &Path) -> ScanClassification {
        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let mut child = match Command::new(&self.config.program)
            .args(self.config.args_for(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!(
                    program = %self.config.program.display(),
                    error = %e,
                    "Failed to spawn detector"
                );
                return ScanClassification::Error;
            }
        };

        // Drain stdout concurrently so a chatty scanner cannot block on a full pipe.
        let (tx, output) = mpsc::channel();
        match child.stdout.take() {
            Some(mut stdout) => {
                std::thread::spawn(move || {
                    let mut out = Vec::new();
                    let _ = stdout.read_to_end(&mut out);
                    let _ = tx.send(String::from_utf8_lossy(&out).into_owned());
                });
            }
            None => drop(tx),
        }

        match wait_with_timeout(&mut child, &self.timeout_config()) {
            Ok(status) => match status.code() {
                Some(code) => classify_exit(
                    code,
                    &collect(&output, deadline),
                    &self.config.threat_marker,
                    self.config.threat_field,
                ),
                None => {
                    warn!("Detector terminated by signal");
                    ScanClassification::Error
                }
            },
            // The reader is left detached here: a killed scanner's own
            // children may still hold the pipe open.
            Err(MalsliceError::Timeout { seconds }) => {
                warn!(seconds, path = %path.display(), "Detector scan timed out");
                ScanClassification::TimedOut
            }
            Err(e) => {
                error!(error = %e, "Failed waiting on detector");
                ScanClassification::Error
            }
        }
    }
}

/// Wait for the drained stdout until `deadline`.
///
/// Anything the scanner spawned may keep the pipe open after it exits; past
/// the deadline the reader is abandoned and the exit code alone classifies.
fn collect(output: &Receiver<String>, deadline: Instant) -> String {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match output.recv_timeout(remaining) {
        Ok(out) => out,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!("Detector output still open at deadline, ignoring it");
            String::new()
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => String::new(),
    }
}

/// Map a scanner exit code and its stdout to a classification.
pub fn classify_exit(code: i32, stdout: &str, marker: &str, field: usize) -> ScanClassification {
    match code {
        EXIT_NOT_DETECTED => ScanClassification::NotDetected,
        EXIT_THREAT_DETECTED => {
            let threat_names: Vec<String> =
                parse_threat_name(stdout, marker, field).into_iter().collect();
            if threat_names.is_empty() {
                debug!("Detection without a parseable threat name");
            }
            ScanClassification::Detected { threat_names }
        }
        other => {
            debug!(exit_code = other, "Detector returned error status");
            ScanClassification::Error
        }
    }
}

/// Extract the threat name from the first line containing `marker`.
///
/// The line is split on single spaces, so runs of padding produce empty
/// fields; the name sits at a fixed index in that split.
pub fn parse_threat_name(stdout: &str, marker: &str, field: usize) -> Option<String> {
    stdout
        .lines()
        .filter(|line| line.contains(marker))
        .find_map(|line| line.split(' ').nth(field))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}
