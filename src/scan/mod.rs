//! Prefix-growth scanning of payloads through a [`Detector`].
//!
//! Two drivers share the result model defined here:
//! - [`chunked::scan_payload_chunked`] stops at the first detecting prefix.
//! - [`thorough::scan_payload_thorough`] tracks detected→clean transitions to
//!   bound up to `max_regions` contiguous regions.
//!
//! [`Detector`]: crate::oracle::Detector

pub mod chunked;
pub mod scratch;
pub mod thorough;
pub mod window;

pub use chunked::scan_payload_chunked;
pub use thorough::scan_payload_thorough;
pub use window::{extract_window, window_bounds};

use crate::oracle::ScanClassification;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate outcome of a driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    #[serde(rename = "DEFENDER_RESULT_NOT_COMPLETED")]
    NotCompleted,
    #[serde(rename = "DEFENDER_RESULT_NOT_DETECTED")]
    NotDetected,
    #[serde(rename = "DEFENDER_RESULT_THREAT_DETECTED")]
    ThreatDetected,
    #[serde(rename = "DEFENDER_RESULT_ERROR")]
    Error,
}

impl ResultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::NotCompleted => "DEFENDER_RESULT_NOT_COMPLETED",
            ResultCode::NotDetected => "DEFENDER_RESULT_NOT_DETECTED",
            ResultCode::ThreatDetected => "DEFENDER_RESULT_THREAT_DETECTED",
            ResultCode::Error => "DEFENDER_RESULT_ERROR",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threat names in first-seen order, without duplicates or empty entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ThreatNames(Vec<String>);

impl ThreatNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name` unless it is empty or already present.
    pub fn push(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() || self.0.iter().any(|n| n == name) {
            return;
        }
        self.0.push(name.to_string());
    }

    /// Accumulate the names carried by a classification.
    pub fn absorb(&mut self, classification: &ScanClassification) {
        for name in classification.threat_names() {
            self.push(name);
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// Half-open byte range `[start, end)` of the payload asserted to contain a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaliciousRegion {
    pub start: usize,
    pub end: usize,
    /// `payload[start..end]`
    pub bytes: Bytes,
}

impl MaliciousRegion {
    /// Carve `[start, end)` out of `payload`. Returns `None` for an empty or
    /// out-of-bounds range.
    pub fn carve(payload: &Bytes, start: usize, end: usize) -> Option<Self> {
        if start >= end || end > payload.len() {
            return None;
        }
        Some(Self {
            start,
            end,
            bytes: payload.slice(start..end),
        })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

/// Result of a driver run over one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub result_code: ResultCode,
    pub threat_names: ThreatNames,
    /// Prefix `payload[0..L]` that first triggered (or, for the thorough
    /// fallback, the last prefix scanned).
    pub zero_x_bytes: Option<Bytes>,
    /// Best-effort context window; only set when `regions` is empty.
    pub near_boundary_window: Option<Bytes>,
    pub regions: Vec<MaliciousRegion>,
}

impl Default for ScanResult {
    fn default() -> Self {
        Self {
            result_code: ResultCode::NotCompleted,
            threat_names: ThreatNames::new(),
            zero_x_bytes: None,
            near_boundary_window: None,
            regions: Vec::new(),
        }
    }
}

impl ScanResult {
    /// Base64 of the detected prefix, empty when absent.
    pub fn zero_x_base64(&self) -> String {
        self.zero_x_bytes
            .as_ref()
            .map(|b| BASE64.encode(b))
            .unwrap_or_default()
    }

    /// Base64 of the near-boundary window, empty when absent.
    pub fn near_boundary_base64(&self) -> String {
        self.near_boundary_window
            .as_ref()
            .map(|b| BASE64.encode(b))
            .unwrap_or_default()
    }

    pub fn regions_base64(&self) -> Vec<String> {
        self.regions.iter().map(MaliciousRegion::to_base64).collect()
    }
}

/// Prefix lengths `step, 2*step, ...` below `len`, then `len` itself.
///
/// Yields nothing for an empty payload or a zero step.
pub fn prefix_lengths(len: usize, step: usize) -> impl Iterator<Item = usize> {
    let mut current = 0usize;
    std::iter::from_fn(move || {
        if step == 0 || current >= len {
            return None;
        }
        current = current.saturating_add(step).min(len);
        Some(current)
    })
}
