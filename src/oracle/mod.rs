//! Opaque classifiers the scan drivers consult.
//!
//! A [`Detector`] scans a file on disk and is called once per prefix; a
//! [`BufferScanner`] classifies the whole payload in memory, once per task.

pub mod amsi;
pub mod defender;

pub use amsi::{AmsiScanner, AmsiVerdict};
pub use defender::CommandDetector;

use std::path::Path;

/// Outcome of a single detector invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanClassification {
    NotDetected,
    /// Threat names in report order; may be empty when the detector output
    /// did not carry a parseable name.
    Detected { threat_names: Vec<String> },
    Error,
    TimedOut,
}

impl ScanClassification {
    pub fn is_detected(&self) -> bool {
        matches!(self, ScanClassification::Detected { .. })
    }

    /// True for `Error` and `TimedOut`.
    pub fn is_failure(&self) -> bool {
        matches!(self, ScanClassification::Error | ScanClassification::TimedOut)
    }

    pub fn threat_names(&self) -> &[String] {
        match self {
            ScanClassification::Detected { threat_names } => threat_names,
            _ => &[],
        }
    }
}

/// File-based detection oracle.
pub trait Detector {
    /// Classify the file at `path`. Failures are reported as
    /// `Error`/`TimedOut`, never as a panic.
    fn scan_file(&self, path: &Path) -> ScanClassification;
}

impl<D: Detector + ?Sized> Detector for &D {
    fn scan_file(&self, path: &Path) -> ScanClassification {
        (**self).scan_file(path)
    }
}

impl<D: Detector + ?Sized> Detector for std::sync::Arc<D> {
    fn scan_file(&self, path: &Path) -> ScanClassification {
        (**self).scan_file(path)
    }
}

/// In-memory buffer classification oracle.
pub trait BufferScanner {
    fn scan_buffer(&self, buffer: &[u8]) -> AmsiVerdict;
}

impl<B: BufferScanner + ?Sized> BufferScanner for std::sync::Arc<B> {
    fn scan_buffer(&self, buffer: &[u8]) -> AmsiVerdict {
        (**self).scan_buffer(buffer)
    }
}
