//! # In-Memory Log Store
//!
//! A process-local implementation of the log-store ports. Streams are
//! append-only vectors; live subscribers receive records appended after they
//! subscribed, over unbounded channels.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use logbus_types::{ProposedRecord, StreamRecord};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::ports::{AppendReceipt, ConnectionDescriptor, Connector, LogConnection, RecordStream};

type LiveSender = mpsc::UnboundedSender<Result<StreamRecord, StoreError>>;

struct LiveSubscriber {
    connection_id: u64,
    sender: LiveSender,
}

#[derive(Default)]
struct StreamState {
    records: Vec<StreamRecord>,
    subscribers: Vec<LiveSubscriber>,
}

/// Process-local append-only store.
#[derive(Default)]
pub struct InMemoryLogStore {
    streams: Mutex<HashMap<String, StreamState>>,
    appends: AtomicU64,
}

impl InMemoryLogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and fan it out to live subscribers.
    ///
    /// Connections call this; tests may call it directly to inject records
    /// that no publisher would produce.
    pub fn append_record(&self, stream: &str, record: ProposedRecord) -> AppendReceipt {
        let mut streams = self.streams.lock();
        let state = streams.entry(stream.to_string()).or_default();

        let sequence = state.records.len() as u64;
        let record = StreamRecord::from_proposed(stream, sequence, record);
        state.records.push(record.clone());
        state
            .subscribers
            .retain(|sub| sub.sender.send(Ok(record.clone())).is_ok());

        self.appends.fetch_add(1, Ordering::Relaxed);
        debug!(
            stream = stream,
            sequence = sequence,
            type_tag = %record.type_tag,
            "Record appended"
        );
        AppendReceipt { sequence }
    }

    fn subscribe(&self, connection_id: u64, stream: &str) -> RecordStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut streams = self.streams.lock();
        let subscribers = &mut streams.entry(stream.to_string()).or_default().subscribers;
        // Quiet streams never reach the pruning in `append_record`.
        subscribers.retain(|sub| !sub.sender.is_closed());
        subscribers.push(LiveSubscriber {
            connection_id,
            sender,
        });
        debug!(stream = stream, connection_id, "Live subscription opened");
        Box::pin(UnboundedReceiverStream::new(receiver))
    }

    /// End every live subscription on a stream with the given reason.
    pub fn terminate_subscriptions(&self, stream: &str, reason: &str) {
        let mut streams = self.streams.lock();
        if let Some(state) = streams.get_mut(stream) {
            for sub in state.subscribers.drain(..) {
                let _ = sub.sender.send(Err(StoreError::SubscriptionDropped {
                    reason: reason.to_string(),
                }));
            }
        }
        info!(stream = stream, reason = reason, "Live subscriptions terminated");
    }

    fn drop_connection(&self, connection_id: u64) {
        let mut streams = self.streams.lock();
        for state in streams.values_mut() {
            state.subscribers.retain(|sub| {
                if sub.connection_id != connection_id {
                    return true;
                }
                let _ = sub.sender.send(Err(StoreError::SubscriptionDropped {
                    reason: "connection closed".to_string(),
                }));
                false
            });
        }
    }

    /// All records of a stream, in append order.
    #[must_use]
    pub fn records(&self, stream: &str) -> Vec<StreamRecord> {
        self.streams
            .lock()
            .get(stream)
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    /// Total appends across all streams.
    #[must_use]
    pub fn append_count(&self) -> u64 {
        self.appends.load(Ordering::Relaxed)
    }

    /// Live subscribers on a stream whose receivers are still open.
    #[must_use]
    pub fn subscriber_count(&self, stream: &str) -> usize {
        self.streams
            .lock()
            .get(stream)
            .map(|s| s.subscribers.iter().filter(|sub| !sub.sender.is_closed()).count())
            .unwrap_or(0)
    }
}

/// One connection to an `InMemoryLogStore`.
pub struct InMemoryConnection {
    id: u64,
    store: Arc<InMemoryLogStore>,
    closed: AtomicBool,
}

impl InMemoryConnection {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl LogConnection for InMemoryConnection {
    async fn append(
        &self,
        stream: &str,
        record: ProposedRecord,
    ) -> Result<AppendReceipt, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(self.store.append_record(stream, record))
    }

    async fn subscribe_live(&self, stream: &str) -> Result<RecordStream, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(self.store.subscribe(self.id, stream))
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.store.drop_connection(self.id);
        info!(connection_id = self.id, "In-memory connection closed");
    }
}

/// Connector for an `InMemoryLogStore`.
///
/// Counts connect attempts and can delay or fail them, which makes it the
/// fake transport for gateway and endpoint tests.
pub struct InMemoryConnector {
    store: Arc<InMemoryLogStore>,
    attempts: AtomicUsize,
    failures_remaining: AtomicUsize,
    delay: Option<Duration>,
    next_id: AtomicU64,
    connections: Mutex<Vec<Arc<InMemoryConnection>>>,
}

impl InMemoryConnector {
    #[must_use]
    pub fn new(store: Arc<InMemoryLogStore>) -> Self {
        Self {
            store,
            attempts: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
            delay: None,
            next_id: AtomicU64::new(1),
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Delay every connect attempt.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `count` connect attempts.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::Release);
    }

    #[must_use]
    pub fn store(&self) -> &Arc<InMemoryLogStore> {
        &self.store
    }

    /// Number of `connect` calls so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Acquire)
    }

    /// Connections handed out so far.
    #[must_use]
    pub fn connections(&self) -> Vec<Arc<InMemoryConnection>> {
        self.connections.lock().clone()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<dyn LogConnection>, StoreError> {
        self.attempts.fetch_add(1, Ordering::AcqRel);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .failures_remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Unavailable(format!(
                "{descriptor} refused the connection"
            )));
        }

        let connection = Arc::new(InMemoryConnection {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            store: Arc::clone(&self.store),
            closed: AtomicBool::new(false),
        });
        self.connections.lock().push(Arc::clone(&connection));
        info!(descriptor = %descriptor, connection_id = connection.id, "In-memory connection opened");
        Ok(connection)
    }
}
