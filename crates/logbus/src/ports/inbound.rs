//! Inbound Ports (Driving Ports)
//!
//! The surface a service-bus core consumes: something to publish typed
//! messages to and something to subscribe typed messages from.

use async_trait::async_trait;

use crate::error::{PublishError, SourceError};
use crate::ports::outbound::AppendReceipt;
use crate::subscription::Subscription;

/// Publishes typed messages to one stream.
#[async_trait]
pub trait MessagePublisher<M>: Send + Sync {
    async fn publish(&self, message: &M) -> Result<AppendReceipt, PublishError>;

    /// Stop publishing. Idempotent.
    fn dispose(&self);
}

/// A typed live feed.
#[async_trait]
pub trait MessageSource<M>: Send + Sync {
    /// Open a new live subscription.
    async fn subscribe(&self) -> Result<Subscription<M>, SourceError>;
}
