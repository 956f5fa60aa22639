//! Configuration for the scanning agent.
//!
//! Step sizes, region bounds and detector timeouts are plain values passed
//! into the drivers, so tests can use small synthetic steps.

use crate::error::{MalsliceError, Result};
use crate::timeout::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_SECONDS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder in detector arguments replaced with the scratch file path.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Master configuration for the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the tasking server, e.g. `http://10.0.0.5:8000`.
    pub server_url: String,
    /// Prefix-scanning configuration.
    pub scan: ScanConfig,
    /// External detector invocation.
    pub detector: DetectorConfig,
    /// Polling and HTTP configuration.
    pub poll: PollConfig,
}

impl AgentConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Reject values the drivers cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(MalsliceError::Config("server_url is empty".into()));
        }
        if self.scan.default_step == 0 || self.scan.thorough_step == 0 {
            return Err(MalsliceError::Config("step sizes must be non-zero".into()));
        }
        if self.scan.max_regions == 0 {
            return Err(MalsliceError::Config("max_regions must be non-zero".into()));
        }
        if self.detector.timeout_secs == 0 {
            return Err(MalsliceError::Config("detector timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Prefix-scanning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Step of the chunked (single-hit) driver.
    pub default_step: usize,
    /// Step of the thorough (region-localization) driver.
    pub thorough_step: usize,
    /// Number of closed regions after which the thorough driver stops.
    pub max_regions: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            default_step: 1024,
            thorough_step: 8198,
            max_regions: 2,
        }
    }
}

/// External detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Scanner executable.
    pub program: PathBuf,
    /// Arguments; `{file}` is replaced with the scratch file path.
    pub args: Vec<String>,
    /// Hard timeout for one scanner invocation.
    pub timeout_secs: u64,
    /// Child status poll interval.
    pub poll_interval_ms: u64,
    /// Marker identifying the stdout line that carries the threat name.
    pub threat_marker: String,
    /// Space-separated field index of the threat name on that line.
    pub threat_field: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(r"C:\Program Files\Windows Defender\MpCmdRun.exe"),
            args: [
                "-Scan",
                "-ScanType",
                "3",
                "-File",
                FILE_PLACEHOLDER,
                "-DisableRemediation",
                "-trace",
                "-Level",
                "0x10",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            timeout_secs: DEFAULT_TIMEOUT_SECONDS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            threat_marker: "Threat  ".to_string(),
            threat_field: 19,
        }
    }
}

impl DetectorConfig {
    /// Arguments with the file placeholder substituted.
    pub fn args_for(&self, file: &Path) -> Vec<String> {
        let file = file.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace(FILE_PLACEHOLDER, &file))
            .collect()
    }
}

/// Polling loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Sleep when the server has no tasks.
    pub idle_delay_secs: u64,
    /// Sleep after a transport error or a processed batch.
    pub error_backoff_secs: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            idle_delay_secs: 5,
            error_backoff_secs: 3,
            request_timeout_secs: 30,
        }
    }
}
