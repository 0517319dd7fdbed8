//! # Error Types
//!
//! Codec errors shared by payload and metadata serialization.

use thiserror::Error;

/// Errors raised while encoding or decoding payloads and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// JSON encoding or decoding failed.
    #[error("JSON codec error: {0}")]
    Json(String),

    /// Bincode encoding or decoding failed.
    #[error("Bincode codec error: {0}")]
    Bincode(String),

    /// Metadata bytes were not a JSON object of string values.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Json(err.to_string())
    }
}

impl From<bincode::Error> for CodecError {
    fn from(err: bincode::Error) -> Self {
        CodecError::Bincode(err.to_string())
    }
}
