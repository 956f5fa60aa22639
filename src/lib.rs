//! Malicious-region localization agent.
//!
//! Polls a tasking server for files, rescans growing prefixes of each file
//! through an external antivirus detector, and reports the smallest byte
//! windows that flip the detector's verdict.

pub mod config;
pub mod error;
pub mod logging;
pub mod oracle;
pub mod scan;
pub mod task;
pub mod timeout;

pub use config::AgentConfig;
pub use error::{MalsliceError, Result};
pub use oracle::{AmsiVerdict, BufferScanner, Detector, ScanClassification};
pub use scan::{MaliciousRegion, ResultCode, ScanResult};
