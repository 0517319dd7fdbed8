//! # Stream Records
//!
//! The unit appended to and read from a stream.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CodecError;
use crate::properties::PropertyMap;

/// A record as handed to the store by a publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedRecord {
    /// Unique identifier, freshly generated per publish.
    pub record_id: Uuid,
    /// Simple type name of the concrete message.
    pub type_tag: String,
    /// Serialized message.
    pub payload: Vec<u8>,
    /// JSON property map; `None` when there are no properties.
    pub metadata: Option<Vec<u8>>,
    /// Whether `payload` is JSON.
    pub is_json: bool,
}

impl ProposedRecord {
    /// Create a record with a new v4 id and no metadata.
    pub fn new(type_tag: impl Into<String>, payload: Vec<u8>, is_json: bool) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            type_tag: type_tag.into(),
            payload,
            metadata: None,
            is_json,
        }
    }

    /// Attach encoded metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Option<Vec<u8>>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A record as stored in, and delivered from, a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Stream the record belongs to.
    pub stream: String,
    /// Position within the stream, assigned by the store.
    pub sequence: u64,
    pub record_id: Uuid,
    pub type_tag: String,
    pub payload: Vec<u8>,
    pub metadata: Option<Vec<u8>>,
    pub is_json: bool,
}

impl StreamRecord {
    /// Materialize a proposed record at a stream position.
    #[must_use]
    pub fn from_proposed(stream: impl Into<String>, sequence: u64, record: ProposedRecord) -> Self {
        Self {
            stream: stream.into(),
            sequence,
            record_id: record.record_id,
            type_tag: record.type_tag,
            payload: record.payload,
            metadata: record.metadata,
            is_json: record.is_json,
        }
    }

    /// Decode the record's property map.
    pub fn properties(&self) -> Result<PropertyMap, CodecError> {
        PropertyMap::from_metadata(self.metadata.as_deref())
    }
}
