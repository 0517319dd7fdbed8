//! Outbound Ports (Driven Ports)
//!
//! The log store is an external system. These traits are all the adapter
//! needs from it: appending one record to a named stream and opening a live
//! subscription on a named stream.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use logbus_types::{ProposedRecord, StreamRecord};

use crate::error::StoreError;

/// Live records from one stream. Dropping the stream releases the
/// store-side subscription.
pub type RecordStream = BoxStream<'static, Result<StreamRecord, StoreError>>;

/// Acknowledgement of a successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReceipt {
    /// Position assigned by the store.
    pub sequence: u64,
}

/// Opaque address of a log store (a connection string or URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionDescriptor(String);

impl ConnectionDescriptor {
    /// Wrap a descriptor. Returns `None` for a blank string.
    pub fn new(descriptor: impl Into<String>) -> Option<Self> {
        let descriptor = descriptor.into();
        if descriptor.trim().is_empty() {
            None
        } else {
            Some(Self(descriptor))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An established connection to a log store.
///
/// Shared by reference between every publisher and source of a gateway.
#[async_trait]
pub trait LogConnection: Send + Sync {
    /// Append one record. No expected-version check is performed.
    async fn append(
        &self,
        stream: &str,
        record: ProposedRecord,
    ) -> Result<AppendReceipt, StoreError>;

    /// Subscribe from the current end of the stream. History is not replayed.
    async fn subscribe_live(&self, stream: &str) -> Result<RecordStream, StoreError>;

    /// Close the connection. Idempotent.
    fn close(&self);
}

/// Opens connections to a log store.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<dyn LogConnection>, StoreError>;
}
