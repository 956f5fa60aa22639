//! Scoped scratch storage for prefix files handed to the detector.
//!
//! One directory per driver run, one file per prefix. Both are removed on
//! drop, so early returns and `?` propagation still clean up.

use crate::error::Result;
use crate::oracle::{Detector, ScanClassification};
use std::io::Write;
use std::path::Path;
use tempfile::{TempDir, TempPath};
use tracing::{trace, warn};

/// Scratch directory owned by a single driver run.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh directory under the system temp dir.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("malslice-").tempdir()?;
        trace!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Materialize `prefix` as `chunk_<len>_*.tmp`. The handle is closed
    /// before returning so the scanner can open the file freely.
    pub fn write_prefix(&self, prefix: &[u8]) -> Result<ScratchFile> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("chunk_{}_", prefix.len()))
            .suffix(".tmp")
            .tempfile_in(self.dir.path())?;
        file.write_all(prefix)?;
        file.flush()?;
        Ok(ScratchFile {
            path: file.into_temp_path(),
        })
    }

    /// Write `prefix`, run the detector on it and delete the file again.
    pub fn scan_prefix<D: Detector + ?Sized>(
        &self,
        detector: &D,
        prefix: &[u8],
    ) -> Result<ScanClassification> {
        let file = self.write_prefix(prefix)?;
        let classification = detector.scan_file(file.path());
        file.remove();
        Ok(classification)
    }

    /// Remove the directory recursively, logging rather than failing.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove scratch directory");
        }
    }
}

/// A prefix file on disk; deleted when dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete now, logging failures (e.g. the scanner quarantined the file).
    pub fn remove(self) {
        let path = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to delete scratch file");
            }
        }
    }
}
