//! # Source
//!
//! Opens live subscriptions on one stream and turns its records into typed
//! messages.
//!
//! Each subscription runs a pump task:
//!
//! ```text
//!   RecordStream ─▶ property filter ─▶ registry decode ─▶ channel ─▶ Subscription
//!                        │ (false)            │ (error)
//!                        ▼                    ▼
//!                     dropped           terminal Err, pump exits
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use logbus_types::{StreamName, StreamRecord};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::domain::{DeserializerRegistry, PropertyFilter};
use crate::error::{SourceError, StoreError};
use crate::gateway::ConnectionGateway;
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{MessageSource, RecordStream};
use crate::subscription::{Subscription, SubscriptionHandle};

/// Typed live reader for one stream.
pub struct Source<M> {
    stream: StreamName,
    gateway: Arc<ConnectionGateway>,
    registry: Arc<DeserializerRegistry<M>>,
    filter: Option<PropertyFilter>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl<M: Send + 'static> Source<M> {
    #[must_use]
    pub fn new(
        stream: StreamName,
        gateway: Arc<ConnectionGateway>,
        registry: Arc<DeserializerRegistry<M>>,
    ) -> Self {
        Self {
            stream,
            gateway,
            registry,
            filter: None,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Only deliver records whose properties pass `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<PropertyFilter>) -> Self {
        self.filter = filter;
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

    /// Open a live subscription from the current end of the stream.
    ///
    /// # Errors
    ///
    /// - `SourceError::Connection` - the gateway could not connect
    /// - `SourceError::Store` - the store refused the subscription
    pub async fn subscribe(&self) -> Result<Subscription<M>, SourceError> {
        let connection = self.gateway.connection().await?;
        let records = connection
            .subscribe_live(self.stream.as_str())
            .await
            .map_err(|source| SourceError::Store {
                stream: self.stream.to_string(),
                source,
            })?;

        let (handle, shutdown) = SubscriptionHandle::new();
        let (sender, receiver) = mpsc::unbounded_channel();
        let pump = Pump {
            stream: self.stream.to_string(),
            registry: Arc::clone(&self.registry),
            filter: self.filter.clone(),
            metrics: Arc::clone(&self.metrics),
        };
        tokio::spawn(pump.run(records, sender, shutdown));

        info!(stream = %self.stream, "Live subscription started");
        Ok(Subscription::new(
            UnboundedReceiverStream::new(receiver).boxed(),
            handle,
        ))
    }
}

#[async_trait]
impl<M: Send + 'static> MessageSource<M> for Source<M> {
    async fn subscribe(&self) -> Result<Subscription<M>, SourceError> {
        Source::subscribe(self).await
    }
}

impl<M> std::fmt::Debug for Source<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("stream", &self.stream)
            .field("registry", &self.registry)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

struct Pump<M> {
    stream: String,
    registry: Arc<DeserializerRegistry<M>>,
    filter: Option<PropertyFilter>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl<M: Send + 'static> Pump<M> {
    async fn run(
        self,
        mut records: RecordStream,
        sender: mpsc::UnboundedSender<Result<M, SourceError>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let item = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                item = records.next() => item,
            };

            let outcome = match item {
                Some(Ok(record)) => self.process(record),
                Some(Err(err)) => Err(self.terminated(err)),
                None => Err(SourceError::Terminated {
                    stream: self.stream.clone(),
                    reason: "stream ended by store".to_string(),
                }),
            };

            match outcome {
                Ok(None) => {}
                Ok(Some(message)) => {
                    if sender.send(Ok(message)).is_err() {
                        break;
                    }
                    self.metrics.record_delivered(&self.stream);
                }
                Err(err) => {
                    warn!(stream = %self.stream, error = %err, "Subscription terminated");
                    self.metrics.record_terminated(&self.stream);
                    let _ = sender.send(Err(err));
                    break;
                }
            }
        }
        debug!(stream = %self.stream, "Subscription pump stopped");
    }

    /// Filter then decode one record. `Ok(None)` means filtered out.
    fn process(&self, record: StreamRecord) -> Result<Option<M>, SourceError> {
        if let Some(filter) = &self.filter {
            let properties = record.properties().map_err(|source| SourceError::Metadata {
                stream: self.stream.clone(),
                source,
            })?;
            if !filter(&properties) {
                debug!(
                    stream = %self.stream,
                    record_id = %record.record_id,
                    type_tag = %record.type_tag,
                    "Record filtered out"
                );
                self.metrics.record_filtered(&self.stream);
                return Ok(None);
            }
        }

        match self.registry.decode(&record.type_tag, &record.payload) {
            Some(Ok(message)) => {
                debug!(
                    stream = %self.stream,
                    record_id = %record.record_id,
                    type_tag = %record.type_tag,
                    "Record delivered"
                );
                Ok(Some(message))
            }
            Some(Err(source)) => Err(SourceError::Deserialization {
                stream: self.stream.clone(),
                tag: record.type_tag,
                source,
            }),
            None => Err(SourceError::UnknownTypeTag {
                stream: self.stream.clone(),
                tag: record.type_tag,
            }),
        }
    }

    fn terminated(&self, err: StoreError) -> SourceError {
        let reason = match err {
            StoreError::SubscriptionDropped { reason } => reason,
            other => other.to_string(),
        };
        SourceError::Terminated {
            stream: self.stream.clone(),
            reason,
        }
    }
}
