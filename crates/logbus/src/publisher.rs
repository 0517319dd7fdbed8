//! # Publisher
//!
//! Appends typed messages to one stream. Each publish writes exactly one
//! record with a fresh id; there is no expected-version check, so a retried
//! publish may produce a duplicate.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use logbus_types::{Message, PayloadFormat, ProposedRecord, StreamName};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::PropertyProvider;
use crate::error::PublishError;
use crate::gateway::ConnectionGateway;
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{AppendReceipt, MessagePublisher};

/// Typed writer for one stream.
pub struct Publisher<M> {
    stream: StreamName,
    gateway: Arc<ConnectionGateway>,
    format: PayloadFormat,
    property_provider: Option<PropertyProvider>,
    metrics: Arc<dyn MetricsRecorder>,
    disposed: AtomicBool,
    _message: PhantomData<fn(&M)>,
}

impl<M: Message + Serialize> Publisher<M> {
    #[must_use]
    pub fn new(stream: StreamName, gateway: Arc<ConnectionGateway>, format: PayloadFormat) -> Self {
        Self {
            stream,
            gateway,
            format,
            property_provider: None,
            metrics: Arc::new(NoOpMetrics),
            disposed: AtomicBool::new(false),
            _message: PhantomData,
        }
    }

    /// Attach properties computed from each outgoing message.
    #[must_use]
    pub fn with_property_provider(mut self, provider: Option<PropertyProvider>) -> Self {
        self.property_provider = provider;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn stream(&self) -> &StreamName {
        &self.stream
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Append one message to the stream.
    ///
    /// A call that passed the disposed check before `dispose()` may still
    /// complete its append.
    ///
    /// # Errors
    ///
    /// - `PublishError::Disposed` - publisher disposed; nothing was sent
    /// - `PublishError::Serialization` - payload or properties did not encode
    /// - `PublishError::Connection` - the gateway could not connect
    /// - `PublishError::Store` - the store rejected the append
    pub async fn publish(&self, message: &M) -> Result<AppendReceipt, PublishError> {
        if self.is_disposed() {
            return Err(PublishError::Disposed {
                stream: self.stream.to_string(),
            });
        }

        let result = self.append(message).await;
        if let Err(err) = &result {
            warn!(
                stream = %self.stream,
                type_tag = message.type_tag(),
                error = %err,
                "Publish failed"
            );
            self.metrics.record_publish_failure(self.stream.as_str());
        }
        result
    }

    /// Publish messages one after another, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// The first error encountered; earlier messages stay appended.
    pub async fn publish_batch(&self, messages: &[M]) -> Result<Vec<AppendReceipt>, PublishError> {
        let mut receipts = Vec::with_capacity(messages.len());
        for message in messages {
            receipts.push(self.publish(message).await?);
        }
        Ok(receipts)
    }

    async fn append(&self, message: &M) -> Result<AppendReceipt, PublishError> {
        let payload = self.format.encode(message)?;
        let metadata = match &self.property_provider {
            Some(provider) => provider(message as &dyn Message).to_metadata()?,
            None => None,
        };
        let record = ProposedRecord::new(message.type_tag(), payload, self.format.is_json())
            .with_metadata(metadata);
        let record_id = record.record_id;

        let connection = self.gateway.connection().await?;
        let receipt = connection
            .append(self.stream.as_str(), record)
            .await
            .map_err(|source| PublishError::Store {
                stream: self.stream.to_string(),
                source,
            })?;

        self.metrics.record_append(self.stream.as_str());
        debug!(
            stream = %self.stream,
            type_tag = message.type_tag(),
            record_id = %record_id,
            sequence = receipt.sequence,
            "Message published"
        );
        Ok(receipt)
    }

    /// Refuse further publishes. Idempotent.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            info!(stream = %self.stream, "Publisher disposed");
        }
    }
}

#[async_trait]
impl<M: Message + Serialize> MessagePublisher<M> for Publisher<M> {
    async fn publish(&self, message: &M) -> Result<AppendReceipt, PublishError> {
        Publisher::publish(self, message).await
    }

    fn dispose(&self) {
        Publisher::dispose(self);
    }
}

impl<M> std::fmt::Debug for Publisher<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("stream", &self.stream)
            .field("format", &self.format)
            .field("disposed", &self.disposed.load(Ordering::Acquire))
            .finish()
    }
}
