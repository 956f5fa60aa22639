//! Thorough (region-localization) driver.
//!
//! Prefixes grow by a large step. A region opens when the detector first
//! fires and closes when a later prefix comes back clean; both boundaries are
//! recorded as `L - step`, i.e. the prefix length before the step that
//! changed the verdict. Scanning stops once `max_regions` regions are closed.

use super::scratch::ScratchDir;
use super::{prefix_lengths, window_bounds, MaliciousRegion, ResultCode, ScanResult};
use crate::error::{MalsliceError, Result};
use crate::oracle::{Detector, ScanClassification};
use bytes::Bytes;
use std::ops::Range;
use tracing::{debug, info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionState {
    Searching,
    InRegion { start: usize },
}

/// Detected/clean transition tracker over prefix boundaries.
#[derive(Debug)]
pub struct RegionTracker {
    step: usize,
    state: RegionState,
    closed: Vec<Range<usize>>,
}

impl RegionTracker {
    pub fn new(step: usize) -> Self {
        Self {
            step,
            state: RegionState::Searching,
            closed: Vec::new(),
        }
    }

    /// Feed the classification of `payload[0..prefix_len]`. Returns the
    /// region closed by this observation, if any.
    pub fn observe(
        &mut self,
        prefix_len: usize,
        classification: &ScanClassification,
    ) -> Option<Range<usize>> {
        let boundary = prefix_len.saturating_sub(self.step);
        match (self.state, classification) {
            (RegionState::Searching, ScanClassification::Detected { .. }) => {
                debug!(start = boundary, "Region opened");
                self.state = RegionState::InRegion { start: boundary };
                None
            }
            (RegionState::InRegion { start }, ScanClassification::NotDetected) => {
                self.state = RegionState::Searching;
                if boundary <= start {
                    return None;
                }
                let region = start..boundary;
                self.closed.push(region.clone());
                Some(region)
            }
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, RegionState::InRegion { .. })
    }

    pub fn closed(&self) -> &[Range<usize>] {
        &self.closed
    }

    pub fn into_closed(self) -> Vec<Range<usize>> {
        self.closed
    }
}

/// Localize up to `max_regions` malicious regions in `payload`.
///
/// When no region closes, the last scanned prefix becomes `zero_x_bytes` and
/// its near-boundary window (width `step`) is reported instead. Once any
/// region is found the window is never set.
pub fn scan_payload_thorough<D: Detector + ?Sized>(
    detector: &D,
    payload: &Bytes,
    step: usize,
    max_regions: usize,
) -> Result<ScanResult> {
    if step == 0 {
        return Err(MalsliceError::InvalidInput("step must be non-zero".into()));
    }
    if max_regions == 0 {
        return Err(MalsliceError::InvalidInput("max_regions must be non-zero".into()));
    }

    let span = info_span!("thorough_scan", len = payload.len(), step, max_regions);
    let _guard = span.enter();

    let mut result = ScanResult::default();
    let mut tracker = RegionTracker::new(step);
    let mut last_chunk: Option<Bytes> = None;

    if !payload.is_empty() {
        let scratch = ScratchDir::new()?;
        let total = payload.len().div_ceil(step);

        for (idx, len) in prefix_lengths(payload.len(), step).enumerate() {
            debug!("Scanning chunk {}/{}", idx + 1, total);

            let chunk = payload.slice(..len);
            let classification = scratch.scan_prefix(detector, &chunk)?;
            last_chunk = Some(chunk);
            result.threat_names.absorb(&classification);

            if classification.is_failure() {
                warn!(prefix_len = len, classification = ?classification, "Detector failed on prefix");
            }
            if let Some(region) = tracker.observe(len, &classification) {
                info!(start = region.start, end = region.end, "Found malicious region");
            }
            if tracker.closed().len() >= max_regions {
                debug!(regions = tracker.closed().len(), "Region bound reached");
                break;
            }
        }

        scratch.close();
    }

    result.regions = tracker
        .into_closed()
        .into_iter()
        .filter_map(|r| MaliciousRegion::carve(payload, r.start, r.end))
        .collect();

    if result.regions.is_empty() {
        result.result_code = ResultCode::NotDetected;
        if let Some(chunk) = last_chunk {
            result.near_boundary_window = window_bounds(chunk.len(), step).map(|r| chunk.slice(r));
            result.zero_x_bytes = Some(chunk);
        }
    } else {
        result.result_code = ResultCode::ThreatDetected;
    }

    Ok(result)
}
