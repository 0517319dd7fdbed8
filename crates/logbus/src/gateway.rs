//! # Connection Gateway
//!
//! Lazily establishes one connection to the log store and shares it with
//! every publisher and source built on the gateway.
//!
//! ## State Machine
//!
//! ```text
//!   Idle ──connection()──▶ Connecting ──ok──▶ Connected
//!    ▲                        │
//!    └──── err (Retry) ───────┤
//!                             └── err (Sticky) ──▶ Failed
//!
//!   any state ──close()──▶ Closed
//! ```
//!
//! The transition out of `Idle` happens under a lock, so concurrent first
//! callers all await the same in-flight attempt and exactly one connect is
//! issued. The lock is never held across an await point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::ConnectionError;
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{ConnectionDescriptor, Connector, LogConnection};
use crate::DEFAULT_CONNECT_TIMEOUT_MS;

type ConnectResult = Result<Arc<dyn LogConnection>, ConnectionError>;
type ConnectFuture = Shared<BoxFuture<'static, ConnectResult>>;

/// What happens to later callers after a connect attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Forget the failed attempt; the next call connects again.
    #[default]
    Retry,
    /// Cache the failure; every later call receives it.
    Sticky,
}

enum GatewayState {
    Idle,
    Connecting { attempt: u64, future: ConnectFuture },
    Connected(Arc<dyn LogConnection>),
    Failed(ConnectionError),
    Closed,
}

/// Lazily connected, shared handle to a log store.
pub struct ConnectionGateway {
    descriptor: ConnectionDescriptor,
    connector: Arc<dyn Connector>,
    policy: FailurePolicy,
    connect_timeout: Duration,
    metrics: Arc<dyn MetricsRecorder>,
    state: Mutex<GatewayState>,
    attempts: AtomicU64,
}

impl ConnectionGateway {
    /// Create an unconnected gateway. No I/O happens until `connection()`.
    pub fn new(descriptor: ConnectionDescriptor, connector: Arc<dyn Connector>) -> Self {
        Self {
            descriptor,
            connector,
            policy: FailurePolicy::default(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            metrics: Arc::new(NoOpMetrics),
            state: Mutex::new(GatewayState::Idle),
            attempts: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get the shared connection, connecting on first use.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::Failed` / `Timeout` - the attempt this call joined
    ///   failed; every caller that joined it sees the same error
    /// - `ConnectionError::Closed` - the gateway was closed
    pub async fn connection(&self) -> ConnectResult {
        let (attempt, future, started) = {
            let mut state = self.state.lock();
            match &*state {
                GatewayState::Connected(conn) => return Ok(Arc::clone(conn)),
                GatewayState::Failed(err) => return Err(err.clone()),
                GatewayState::Closed => return Err(ConnectionError::Closed),
                GatewayState::Connecting { attempt, future } => {
                    (*attempt, future.clone(), false)
                }
                GatewayState::Idle => {
                    let attempt = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
                    let future = self.connect_attempt(attempt).shared();
                    *state = GatewayState::Connecting {
                        attempt,
                        future: future.clone(),
                    };
                    (attempt, future, true)
                }
            }
        };

        // Recorders are user code; never call them under the state lock.
        if started {
            self.metrics.record_connect_attempt(self.descriptor.as_str());
        }

        let result = future.await;
        self.settle(attempt, result)
    }

    /// Record the outcome of `attempt`, unless another caller already did.
    fn settle(&self, attempt: u64, result: ConnectResult) -> ConnectResult {
        let mut state = self.state.lock();
        match &*state {
            GatewayState::Connecting { attempt: current, .. } if *current == attempt => {
                *state = match &result {
                    Ok(conn) => GatewayState::Connected(Arc::clone(conn)),
                    Err(err) => match self.policy {
                        FailurePolicy::Retry => GatewayState::Idle,
                        FailurePolicy::Sticky => GatewayState::Failed(err.clone()),
                    },
                };
                result
            }
            GatewayState::Closed => {
                // Closed while the attempt was in flight.
                if let Ok(conn) = &result {
                    conn.close();
                }
                Err(ConnectionError::Closed)
            }
            _ => result,
        }
    }

    fn connect_attempt(&self, attempt: u64) -> BoxFuture<'static, ConnectResult> {
        let connector = Arc::clone(&self.connector);
        let descriptor = self.descriptor.clone();
        let timeout = self.connect_timeout;

        async move {
            info!(descriptor = %descriptor, attempt, "Connecting to log store");
            match tokio::time::timeout(timeout, connector.connect(&descriptor)).await {
                Ok(Ok(conn)) => {
                    info!(descriptor = %descriptor, attempt, "Connected to log store");
                    Ok(conn)
                }
                Ok(Err(err)) => {
                    warn!(descriptor = %descriptor, attempt, error = %err, "Connect failed");
                    Err(ConnectionError::Failed {
                        descriptor: descriptor.to_string(),
                        reason: err.to_string(),
                    })
                }
                Err(_) => {
                    warn!(descriptor = %descriptor, attempt, "Connect timed out");
                    Err(ConnectionError::Timeout {
                        descriptor: descriptor.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }
            }
        }
        .boxed()
    }

    /// Close the connection, if one was made, and refuse further use.
    ///
    /// Idempotent.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), GatewayState::Closed);
        match previous {
            GatewayState::Connected(conn) => {
                conn.close();
                info!(descriptor = %self.descriptor, "Log store connection closed");
            }
            GatewayState::Closed => {}
            _ => debug!(descriptor = %self.descriptor, "Gateway closed before connecting"),
        }
    }

    /// Whether a connection has been established and not closed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(*self.state.lock(), GatewayState::Connected(_))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), GatewayState::Closed)
    }

    /// Connect attempts started so far.
    #[must_use]
    pub fn connect_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl std::fmt::Debug for ConnectionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGateway")
            .field("descriptor", &self.descriptor)
            .field("policy", &self.policy)
            .field("connected", &self.is_connected())
            .finish()
    }
}
