//! Metrics hooks for publish and subscribe traffic
//!
//! The adapter reports through a `MetricsRecorder`. `NoOpMetrics` is the
//! default; `BusMetrics` keeps in-process atomic counters and can be shared
//! across every endpoint of a process.
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = Arc::new(BusMetrics::new());
//! let config = EndpointConfig::<Orders>::builder("Orders")
//!     .metrics(metrics.clone())
//!     // ...
//!     .build()?;
//!
//! println!("{:?}", metrics.snapshot());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for custom metrics recording implementations
///
/// Implement this trait to integrate with external metrics systems.
pub trait MetricsRecorder: Send + Sync {
    /// A connect attempt was started
    fn record_connect_attempt(&self, descriptor: &str);

    /// A record was appended
    fn record_append(&self, stream: &str);

    /// A publish call failed after passing the disposed check
    fn record_publish_failure(&self, stream: &str);

    /// A message was delivered to a subscriber
    fn record_delivered(&self, stream: &str);

    /// A record was dropped by the property filter
    fn record_filtered(&self, stream: &str);

    /// A subscription ended with a terminal error
    fn record_terminated(&self, stream: &str);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_connect_attempt(&self, _: &str) {}
    fn record_append(&self, _: &str) {}
    fn record_publish_failure(&self, _: &str) {}
    fn record_delivered(&self, _: &str) {}
    fn record_filtered(&self, _: &str) {}
    fn record_terminated(&self, _: &str) {}
}

/// Process-wide counters.
#[derive(Debug, Default)]
pub struct BusMetrics {
    pub connect_attempts: AtomicU64,
    pub records_appended: AtomicU64,
    pub publish_failures: AtomicU64,
    pub records_delivered: AtomicU64,
    pub records_filtered: AtomicU64,
    pub subscriptions_terminated: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            records_appended: self.records_appended.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            records_filtered: self.records_filtered.load(Ordering::Relaxed),
            subscriptions_terminated: self.subscriptions_terminated.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.connect_attempts.store(0, Ordering::Relaxed);
        self.records_appended.store(0, Ordering::Relaxed);
        self.publish_failures.store(0, Ordering::Relaxed);
        self.records_delivered.store(0, Ordering::Relaxed);
        self.records_filtered.store(0, Ordering::Relaxed);
        self.subscriptions_terminated.store(0, Ordering::Relaxed);
    }
}

impl MetricsRecorder for BusMetrics {
    fn record_connect_attempt(&self, _: &str) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_append(&self, _: &str) {
        self.records_appended.fetch_add(1, Ordering::Relaxed);
    }

    fn record_publish_failure(&self, _: &str) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delivered(&self, _: &str) {
        self.records_delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_filtered(&self, _: &str) {
        self.records_filtered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_terminated(&self, _: &str) {
        self.subscriptions_terminated.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connect_attempts: u64,
    pub records_appended: u64,
    pub publish_failures: u64,
    pub records_delivered: u64,
    pub records_filtered: u64,
    pub subscriptions_terminated: u64,
}
