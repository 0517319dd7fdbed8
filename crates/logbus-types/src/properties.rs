//! # Property Maps
//!
//! String-to-string metadata carried next to a payload. The map is encoded
//! as a JSON object, independently of the payload format, and an empty map
//! is never written.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::CodecError;

/// Message properties. Keys are unique; order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap(HashMap<String, String>);

impl PropertyMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a property.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode as metadata bytes. Returns `None` for an empty map.
    pub fn to_metadata(&self) -> Result<Option<Vec<u8>>, CodecError> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::to_vec(&self.0)?))
    }

    /// Decode metadata bytes. Absent or zero-length metadata is the empty map.
    pub fn from_metadata(bytes: Option<&[u8]>) -> Result<Self, CodecError> {
        match bytes {
            None => Ok(Self::new()),
            Some(b) if b.is_empty() => Ok(Self::new()),
            Some(b) => serde_json::from_slice::<HashMap<String, String>>(b)
                .map(Self)
                .map_err(|e| CodecError::InvalidMetadata(e.to_string())),
        }
    }
}

impl From<HashMap<String, String>> for PropertyMap {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
