//! Error types for the stream adapter.
//!
//! Every failure surfaces to the immediate caller or subscriber. Nothing in
//! this crate retries.

use logbus_types::CodecError;
use thiserror::Error;

/// Errors reported by a log-store transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Append rejected: {0}")]
    Rejected(String),

    /// The store ended a live subscription.
    #[error("Subscription dropped: {reason}")]
    SubscriptionDropped { reason: String },

    #[error("Connection closed")]
    Closed,
}

/// Errors establishing the shared connection.
///
/// Cloneable so that one failed attempt can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Connect to {descriptor} failed: {reason}")]
    Failed { descriptor: String, reason: String },

    #[error("Connect to {descriptor} timed out after {timeout_ms} ms")]
    Timeout { descriptor: String, timeout_ms: u64 },

    /// The gateway was closed by its owner.
    #[error("Connection closed")]
    Closed,
}

/// Configuration errors. Raised before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Service name is required")]
    MissingServiceName,

    #[error("For service endpoint '{service}', a log store connection descriptor is required")]
    MissingConnection { service: String },

    #[error("For service endpoint '{service}', a connector is required")]
    MissingConnector { service: String },

    #[error("Type tag '{tag}' is registered more than once")]
    DuplicateTypeTag { tag: String },

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    /// A connection-level setting disagrees with the connection scope,
    /// which owns it.
    #[error("For service endpoint '{service}', {setting} is owned by the connection scope")]
    ScopeConflict {
        service: String,
        setting: &'static str,
    },
}

/// Errors from `Publisher::publish`.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The publisher was disposed. No network call was made.
    #[error("Publisher for stream {stream} has been disposed")]
    Disposed { stream: String },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] CodecError),

    #[error("Append to {stream} failed: {source}")]
    Store { stream: String, source: StoreError },
}

/// Errors from a `Source`. Every variant except `Connection` is terminal for
/// the subscription that produced it.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("No deserializer registered for type tag '{tag}' on stream {stream}")]
    UnknownTypeTag { stream: String, tag: String },

    #[error("Failed to deserialize '{tag}' on stream {stream}: {source}")]
    Deserialization {
        stream: String,
        tag: String,
        source: CodecError,
    },

    #[error("Failed to read metadata on stream {stream}: {source}")]
    Metadata { stream: String, source: CodecError },

    /// The transport ended the subscription; `reason` is passed through verbatim.
    #[error("Subscription to {stream} terminated: {reason}")]
    Terminated { stream: String, reason: String },

    #[error("Subscribe to {stream} failed: {source}")]
    Store { stream: String, source: StoreError },
}

impl SourceError {
    /// Whether this error ended an already-open subscription.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SourceError::Connection(_) | SourceError::Store { .. })
    }
}

/// Errors from `EndpointProvider`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// The provider already handed out its endpoint.
    #[error("Endpoint provider for '{service}' has already created an endpoint")]
    AlreadyCreated { service: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
