//! Explicit connection sharing.
//!
//! A `ConnectionScope` owns one `ConnectionGateway`. Every endpoint built with
//! the scope uses that gateway, so they all share a single connection. The
//! scope's owner closes it; endpoints never do. Connection-level settings
//! (failure policy, connect timeout, connect-attempt metrics) belong to the
//! scope and are set through `ConnectionScope::builder`.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::ConfigError;
use crate::gateway::{ConnectionGateway, FailurePolicy};
use crate::metrics::MetricsRecorder;
use crate::ports::{ConnectionDescriptor, Connector};

/// A shared connection for several endpoints.
#[derive(Clone, Debug)]
pub struct ConnectionScope {
    gateway: Arc<ConnectionGateway>,
}

impl ConnectionScope {
    /// Scope with a default gateway for `descriptor`.
    ///
    /// # Errors
    ///
    /// `ConfigError::MissingConnection` for a blank descriptor.
    pub fn new(
        descriptor: impl Into<String>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConfigError> {
        Self::builder(descriptor, connector).build()
    }

    #[must_use]
    pub fn builder(
        descriptor: impl Into<String>,
        connector: Arc<dyn Connector>,
    ) -> ConnectionScopeBuilder {
        ConnectionScopeBuilder {
            descriptor: descriptor.into(),
            connector,
            policy: None,
            connect_timeout: None,
            metrics: None,
        }
    }

    /// Scope around a preconfigured gateway.
    #[must_use]
    pub fn from_gateway(gateway: ConnectionGateway) -> Self {
        info!(descriptor = %gateway.descriptor(), "Connection scope opened");
        Self {
            gateway: Arc::new(gateway),
        }
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<ConnectionGateway> {
        &self.gateway
    }

    /// Close the shared connection. Endpoints built with this scope stop
    /// working afterwards.
    pub fn close(&self) {
        self.gateway.close();
    }
}

/// Builder for a `ConnectionScope` with non-default connection settings.
pub struct ConnectionScopeBuilder {
    descriptor: String,
    connector: Arc<dyn Connector>,
    policy: Option<FailurePolicy>,
    connect_timeout: Option<Duration>,
    metrics: Option<Arc<dyn MetricsRecorder>>,
}

impl ConnectionScopeBuilder {
    #[must_use]
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// # Errors
    ///
    /// `ConfigError::MissingConnection` for a blank descriptor.
    pub fn build(self) -> Result<ConnectionScope, ConfigError> {
        let descriptor = ConnectionDescriptor::new(self.descriptor).ok_or_else(|| {
            ConfigError::MissingConnection {
                service: "connection scope".to_string(),
            }
        })?;
        let mut gateway = ConnectionGateway::new(descriptor, self.connector);
        if let Some(policy) = self.policy {
            gateway = gateway.with_policy(policy);
        }
        if let Some(timeout) = self.connect_timeout {
            gateway = gateway.with_connect_timeout(timeout);
        }
        if let Some(metrics) = self.metrics {
            gateway = gateway.with_metrics(metrics);
        }
        Ok(ConnectionScope::from_gateway(gateway))
    }
}

impl std::fmt::Debug for ConnectionScopeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionScopeBuilder")
            .field("descriptor", &self.descriptor)
            .field("policy", &self.policy)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
