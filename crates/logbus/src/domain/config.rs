//! # Endpoint Configuration
//!
//! `EndpointConfig` is the immutable description of one logical service
//! endpoint. It is assembled with `EndpointConfigBuilder`, which validates
//! once in `build()`; nothing here performs I/O.
//!
//! ## Example
//!
//! ```ignore
//! let config = EndpointConfig::<Orders>::builder("Orders")
//!     .connection("memory://orders")
//!     .connector(connector)
//!     .catalog(MessageCatalog::new().command::<PlaceOrder>().event::<OrderPlaced>())
//!     .property_provider(|_msg| PropertyMap::new().with("tenant", "acme"))
//!     .property_filter(|props| props.get("tenant") == Some("acme"))
//!     .build()?;
//! ```

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use logbus_types::{Message, MessageTypeInfo, PayloadFormat, PropertyMap};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{MessageCatalog, ProjectionBinding, ServiceContract};
use crate::domain::registry::TypeFilter;
use crate::error::ConfigError;
use crate::gateway::FailurePolicy;
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{ConnectionDescriptor, Connector};
use crate::scope::ConnectionScope;
use crate::DEFAULT_CONNECT_TIMEOUT_MS;

/// Computes the properties attached to an outgoing message.
pub type PropertyProvider = Arc<dyn Fn(&dyn Message) -> PropertyMap + Send + Sync>;

/// Decides whether an incoming record is delivered, from its properties.
pub type PropertyFilter = Arc<dyn Fn(&PropertyMap) -> bool + Send + Sync>;

/// Immutable configuration of one logical service endpoint.
pub struct EndpointConfig<C: ServiceContract> {
    pub(crate) service_name: String,
    pub(crate) descriptor: Option<ConnectionDescriptor>,
    pub(crate) connector: Option<Arc<dyn Connector>>,
    pub(crate) scope: Option<ConnectionScope>,
    pub(crate) payload_format: PayloadFormat,
    pub(crate) catalog: MessageCatalog<C>,
    pub(crate) type_filter: Option<TypeFilter>,
    pub(crate) property_provider: Option<PropertyProvider>,
    pub(crate) property_filter: Option<PropertyFilter>,
    pub(crate) projections: Vec<ProjectionBinding<C::Event>>,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) failure_policy: Option<FailurePolicy>,
    pub(crate) metrics: Arc<dyn MetricsRecorder>,
}

impl<C: ServiceContract> EndpointConfig<C> {
    #[must_use]
    pub fn builder(service_name: impl Into<String>) -> EndpointConfigBuilder<C> {
        EndpointConfigBuilder::new(service_name)
    }

    /// Check the configuration without touching the network.
    ///
    /// # Errors
    ///
    /// - `MissingServiceName` - blank service name
    /// - `MissingConnection` - no descriptor and no scope
    /// - `MissingConnector` - no connector and no scope
    /// - `ScopeConflict` - a connect timeout or failure policy that differs
    ///   from the scope's
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::MissingServiceName);
        }
        if let Some(scope) = &self.scope {
            return self.check_scope(scope);
        }
        if self.descriptor.is_none() {
            return Err(ConfigError::MissingConnection {
                service: self.service_name.clone(),
            });
        }
        if self.connector.is_none() {
            return Err(ConfigError::MissingConnector {
                service: self.service_name.clone(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn payload_format(&self) -> PayloadFormat {
        self.payload_format
    }

    #[must_use]
    pub fn projections(&self) -> &[ProjectionBinding<C::Event>] {
        &self.projections
    }

    /// Effective connect timeout. A scope's own timeout wins.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        match &self.scope {
            Some(scope) => scope.gateway().connect_timeout(),
            None => self
                .connect_timeout
                .unwrap_or(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS)),
        }
    }

    /// Effective failure policy. A scope's own policy wins.
    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        match &self.scope {
            Some(scope) => scope.gateway().policy(),
            None => self.failure_policy.unwrap_or_default(),
        }
    }

    fn check_scope(&self, scope: &ConnectionScope) -> Result<(), ConfigError> {
        let gateway = scope.gateway();
        let conflict = |setting: &'static str| ConfigError::ScopeConflict {
            service: self.service_name.clone(),
            setting,
        };
        if self
            .failure_policy
            .is_some_and(|policy| policy != gateway.policy())
        {
            return Err(conflict("failure_policy"));
        }
        if self
            .connect_timeout
            .is_some_and(|timeout| timeout != gateway.connect_timeout())
        {
            return Err(conflict("connect_timeout"));
        }
        Ok(())
    }

    #[must_use]
    pub fn scope(&self) -> Option<&ConnectionScope> {
        self.scope.as_ref()
    }
}

impl<C: ServiceContract> fmt::Debug for EndpointConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("service_name", &self.service_name)
            .field("descriptor", &self.descriptor)
            .field("scoped", &self.scope.is_some())
            .field("payload_format", &self.payload_format)
            .field("registrations", &self.catalog.len())
            .field("projections", &self.projections)
            .field("connect_timeout", &self.connect_timeout())
            .field("failure_policy", &self.failure_policy())
            .finish_non_exhaustive()
    }
}

/// Builder for `EndpointConfig`.
pub struct EndpointConfigBuilder<C: ServiceContract> {
    config: EndpointConfig<C>,
}

impl<C: ServiceContract> EndpointConfigBuilder<C> {
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            config: EndpointConfig {
                service_name: service_name.into(),
                descriptor: None,
                connector: None,
                scope: None,
                payload_format: PayloadFormat::default(),
                catalog: MessageCatalog::new(),
                type_filter: None,
                property_provider: None,
                property_filter: None,
                projections: Vec::new(),
                connect_timeout: None,
                failure_policy: None,
                metrics: Arc::new(NoOpMetrics),
            },
        }
    }

    /// Log store address. A blank descriptor counts as missing.
    #[must_use]
    pub fn connection(mut self, descriptor: impl Into<String>) -> Self {
        self.config.descriptor = ConnectionDescriptor::new(descriptor);
        self
    }

    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.config.connector = Some(connector);
        self
    }

    /// Share the scope's connection instead of opening one per endpoint.
    ///
    /// The scope owns the connect timeout, failure policy and connect-attempt
    /// metrics of that connection.
    #[must_use]
    pub fn scope(mut self, scope: ConnectionScope) -> Self {
        self.config.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn payload_format(mut self, format: PayloadFormat) -> Self {
        self.config.payload_format = format;
        self
    }

    #[must_use]
    pub fn catalog(mut self, catalog: MessageCatalog<C>) -> Self {
        self.config.catalog = catalog;
        self
    }

    #[must_use]
    pub fn type_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&MessageTypeInfo) -> bool + Send + Sync + 'static,
    {
        self.config.type_filter = Some(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn property_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&dyn Message) -> PropertyMap + Send + Sync + 'static,
    {
        self.config.property_provider = Some(Arc::new(provider));
        self
    }

    #[must_use]
    pub fn property_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&PropertyMap) -> bool + Send + Sync + 'static,
    {
        self.config.property_filter = Some(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn projection(mut self, binding: ProjectionBinding<C::Event>) -> Self {
        self.config.projections.push(binding);
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = Some(policy);
        self
    }

    /// Recorder for this endpoint's traffic. Connect attempts on a scoped
    /// connection go to the scope's recorder instead.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.config.metrics = metrics;
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// See `EndpointConfig::validate`.
    pub fn build(self) -> Result<EndpointConfig<C>, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Scalar endpoint settings, loadable from the environment or JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub service_name: String,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub payload_format: PayloadFormat,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl EndpointSettings {
    /// Load settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LOGBUS_SERVICE_NAME`: Service name (required)
    /// - `LOGBUS_CONNECTION`: Log store descriptor
    /// - `LOGBUS_PAYLOAD_FORMAT`: `json` or `bincode` (default: json)
    /// - `LOGBUS_CONNECT_TIMEOUT_MS`: Connect timeout (default: 10000)
    ///
    /// # Errors
    ///
    /// `MissingServiceName` or `InvalidSetting` for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as `from_env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_name = lookup("LOGBUS_SERVICE_NAME")
            .filter(|name| !name.trim().is_empty())
            .ok_or(ConfigError::MissingServiceName)?;

        let payload_format = match lookup("LOGBUS_PAYLOAD_FORMAT") {
            Some(value) => value
                .parse::<PayloadFormat>()
                .map_err(|reason| ConfigError::InvalidSetting {
                    key: "LOGBUS_PAYLOAD_FORMAT".to_string(),
                    reason,
                })?,
            None => PayloadFormat::default(),
        };

        let connect_timeout_ms = match lookup("LOGBUS_CONNECT_TIMEOUT_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidSetting {
                    key: "LOGBUS_CONNECT_TIMEOUT_MS".to_string(),
                    reason: e.to_string(),
                })?,
            None => DEFAULT_CONNECT_TIMEOUT_MS,
        };

        Ok(Self {
            service_name,
            connection: lookup("LOGBUS_CONNECTION"),
            payload_format,
            connect_timeout_ms,
        })
    }

    /// Parse settings from a JSON document.
    ///
    /// # Errors
    ///
    /// `InvalidSetting` when the document does not match.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidSetting {
            key: "settings".to_string(),
            reason: e.to_string(),
        })
    }

    /// Seed a builder with these settings.
    #[must_use]
    pub fn into_builder<C: ServiceContract>(self) -> EndpointConfigBuilder<C> {
        let mut builder = EndpointConfigBuilder::new(self.service_name)
            .payload_format(self.payload_format)
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms));
        if let Some(connection) = self.connection {
            builder = builder.connection(connection);
        }
        builder
    }
}
