//! Error types for the malslice scanning agent.
//!
//! Oracle failures are not errors at this level: they are folded into
//! [`crate::oracle::ScanClassification`]. The variants here cover transport,
//! scratch-file I/O and configuration problems.

use thiserror::Error;

/// Main error type for malslice operations.
#[derive(Debug, Error)]
pub enum MalsliceError {
    /// HTTP transport errors (connect, status, body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Scratch file and process I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload body was not valid base64
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Payload could not be obtained from the server
    #[error("Payload unavailable: {0}")]
    PayloadUnavailable(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// External process timeout
    #[error("Operation timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for malslice operations
pub type Result<T> = std::result::Result<T, MalsliceError>;
