//! Timeout utilities for external detector processes.
//!
//! A hung scanner must never stall the agent, so every child process is
//! waited on with a hard deadline and killed once it expires.

use crate::error::{MalsliceError, Result};
use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Default detector timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600; // 10 minutes

/// Default interval between child status polls in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Timeout configuration for a bounded wait
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Maximum duration for the operation
    pub duration: Duration,
    /// How often the child is polled for exit
    pub poll_interval: Duration,
    /// Whether to log timeout warnings
    pub log_warnings: bool,
    /// Operation name for logging
    pub operation_name: String,
}

impl TimeoutConfig {
    /// Create a new timeout configuration
    pub fn new(seconds: u64, operation: impl Into<String>) -> Self {
        Self {
            duration: Duration::from_secs(seconds),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            log_warnings: true,
            operation_name: operation.into(),
        }
    }

    /// Create a default timeout configuration (10 minutes)
    pub fn default_timeout(operation: impl Into<String>) -> Self {
        Self::new(DEFAULT_TIMEOUT_SECONDS, operation)
    }

    /// Override the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Wait for `child` to exit, killing it if `config.duration` elapses first.
///
/// On expiry the child is killed and reaped before `MalsliceError::Timeout`
/// is returned, so no zombie is left behind.
pub fn wait_with_timeout(child: &mut Child, config: &TimeoutConfig) -> Result<ExitStatus> {
    debug!(
        "Waiting on '{}' with timeout of {}s",
        config.operation_name,
        config.duration.as_secs()
    );

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(
                    "Operation '{}' exited after {:?}",
                    config.operation_name,
                    start.elapsed()
                );
                return Ok(status);
            }
            Ok(None) => {}
            Err(e) => {
                error!(
                    error = %e,
                    "Failed to query '{}', killing child",
                    config.operation_name
                );
                kill_and_reap(child, &config.operation_name);
                return Err(e.into());
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= config.duration {
            if config.log_warnings {
                error!(
                    "Operation '{}' timed out after {}s, killing child",
                    config.operation_name,
                    config.duration.as_secs()
                );
            }
            kill_and_reap(child, &config.operation_name);
            return Err(MalsliceError::Timeout {
                seconds: config.duration.as_secs(),
            });
        }

        let remaining = config.duration - elapsed;
        std::thread::sleep(config.poll_interval.min(remaining));
    }
}

/// Kill `child` and collect its exit status. Failures are logged only.
fn kill_and_reap(child: &mut Child, operation: &str) {
    if let Err(e) = child.kill() {
        // already exited between try_wait and kill
        warn!(error = %e, operation, "Failed to kill child");
    }
    if let Err(e) = child.wait() {
        warn!(error = %e, operation, "Failed to reap child");
    }
}
