//! # LogBus - Service Bus Endpoints over an Append-Only Log Store
//!
//! Maps the four channel roles of a service (commands, events, requests,
//! responses) onto one stream each in a remote log store.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌────────────────────────┐
//!                  │    EndpointProvider    │  single use
//!                  └───────────┬────────────┘
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//!   ┌─────────────────────┐         ┌─────────────────────────┐
//!   │   ServiceEndpoint   │         │  ServiceEndpointClient  │
//!   │ sources:  cmd, req  │         │ sources:  evt(+proj),rsp│
//!   │ publishers: evt,rsp │         │ publishers: cmd, req    │
//!   └──────────┬──────────┘         └────────────┬────────────┘
//!              └───────────────┬─────────────────┘
//!                              ▼
//!                  ┌────────────────────────┐
//!                  │   ConnectionGateway    │  one connect, shared
//!                  └───────────┬────────────┘
//!                              ▼
//!                  ┌────────────────────────┐
//!                  │  LogConnection (port)  │  append / subscribe_live
//!                  └────────────────────────┘
//! ```
//!
//! ## Delivery Semantics
//!
//! - **Appends** are at-least-once with no stream-version check.
//! - **Subscriptions** are live: they start at the stream tail and never
//!   replay history.
//! - **Failures** terminate a subscription with a single error item. Nothing
//!   is retried automatically.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod merge;
pub mod metrics;
pub mod ports;
pub mod publisher;
pub mod scope;
pub mod source;
pub mod subscription;

// Re-export main types
pub use adapters::{InMemoryConnector, InMemoryLogStore};
pub use domain::{
    DeserializerRegistry, EndpointConfig, EndpointConfigBuilder, EndpointSettings,
    MessageCatalog, ProjectionBinding, PropertyFilter, PropertyProvider, Registration,
    RegistryBuilder, ServiceContract, TypeFilter,
};
pub use endpoint::{EndpointProvider, ServiceEndpoint, ServiceEndpointClient};
pub use error::{
    ConfigError, ConnectionError, EndpointError, PublishError, SourceError, StoreError,
};
pub use gateway::{ConnectionGateway, FailurePolicy};
pub use merge::MergedSource;
pub use metrics::{BusMetrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics};
pub use ports::{
    AppendReceipt, ConnectionDescriptor, Connector, LogConnection, MessagePublisher,
    MessageSource, RecordStream,
};
pub use publisher::Publisher;
pub use scope::{ConnectionScope, ConnectionScopeBuilder};
pub use source::Source;
pub use subscription::{Subscription, SubscriptionHandle};

pub use logbus_types::{
    CodecError, Message, MessageType, MessageTypeInfo, PayloadFormat, PropertyMap,
    ProposedRecord, Role, StreamName, StreamRecord,
};

/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
