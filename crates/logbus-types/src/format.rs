//! # Payload Formats
//!
//! The serializer pair used for message payloads. Metadata is always JSON and
//! does not depend on the payload format.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::CodecError;

/// Serializer used for record payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// UTF-8 JSON via `serde_json`.
    #[default]
    Json,
    /// Compact binary via `bincode`.
    Bincode,
}

impl PayloadFormat {
    /// Whether records written with this format are flagged as JSON.
    #[must_use]
    pub fn is_json(self) -> bool {
        matches!(self, PayloadFormat::Json)
    }

    /// Serialize a payload value.
    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            PayloadFormat::Json => Ok(serde_json::to_vec(value)?),
            PayloadFormat::Bincode => Ok(bincode::serialize(value)?),
        }
    }

    /// Deserialize a payload value.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            PayloadFormat::Json => Ok(serde_json::from_slice(bytes)?),
            PayloadFormat::Bincode => Ok(bincode::deserialize(bytes)?),
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFormat::Json => write!(f, "json"),
            PayloadFormat::Bincode => write!(f, "bincode"),
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(PayloadFormat::Json),
            "bincode" => Ok(PayloadFormat::Bincode),
            other => Err(format!("unknown payload format: {other}")),
        }
    }
}
