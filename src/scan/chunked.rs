//! Chunked (single-hit) driver.
//!
//! Scans `payload[0..L]` for `L = step, 2*step, ..., len` and stops at the
//! first detecting prefix.

use super::scratch::ScratchDir;
use super::{prefix_lengths, window_bounds, ResultCode, ScanResult};
use crate::error::{MalsliceError, Result};
use crate::oracle::{Detector, ScanClassification};
use bytes::Bytes;
use tracing::{debug, info, info_span, warn};

/// Scan growing prefixes of `payload` until the detector first fires.
///
/// On detection the prefix is kept as `zero_x_bytes` and a near-boundary
/// window of `step` is cut from it. Without a detection the result is
/// `NotDetected`, or `Error` when the last detector call failed. An empty
/// payload is never scanned and stays `NotCompleted`.
pub fn scan_payload_chunked<D: Detector + ?Sized>(
    detector: &D,
    payload: &Bytes,
    step: usize,
) -> Result<ScanResult> {
    if step == 0 {
        return Err(MalsliceError::InvalidInput("step must be non-zero".into()));
    }

    let span = info_span!("chunked_scan", len = payload.len(), step);
    let _guard = span.enter();

    let mut result = ScanResult::default();
    if payload.is_empty() {
        warn!("Empty payload, nothing to scan");
        return Ok(result);
    }

    let scratch = ScratchDir::new()?;
    let total = payload.len().div_ceil(step);
    let mut last = ScanClassification::NotDetected;

    for (idx, len) in prefix_lengths(payload.len(), step).enumerate() {
        debug!("Scanning chunk {}/{}", idx + 1, total);

        let chunk = payload.slice(..len);
        last = scratch.scan_prefix(detector, &chunk)?;
        result.threat_names.absorb(&last);

        if last.is_detected() {
            info!(prefix_len = len, threats = ?result.threat_names.as_slice(), "Detection at prefix boundary");
            result.near_boundary_window = window_bounds(chunk.len(), step).map(|r| chunk.slice(r));
            result.zero_x_bytes = Some(chunk);
            result.result_code = ResultCode::ThreatDetected;
            break;
        }
        if last.is_failure() {
            warn!(prefix_len = len, classification = ?last, "Detector failed on prefix");
        }
    }

    if result.result_code != ResultCode::ThreatDetected {
        result.result_code = if last.is_failure() {
            ResultCode::Error
        } else {
            ResultCode::NotDetected
        };
    }

    scratch.close();
    Ok(result)
}
