//! # Endpoints
//!
//! `EndpointProvider` wires publishers and sources for the four roles of a
//! service into one of two endpoint shapes:
//!
//! | Role      | `ServiceEndpoint` (server) | `ServiceEndpointClient` |
//! |-----------|----------------------------|-------------------------|
//! | Commands  | source                     | publisher               |
//! | Events    | publisher                  | source (+ projections)  |
//! | Requests  | source                     | publisher               |
//! | Responses | publisher                  | source                  |
//!
//! A provider owns one connection lifecycle and hands out at most one
//! endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use logbus_types::{Message, PayloadFormat, Role, StreamName};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{
    DeserializerRegistry, EndpointConfig, ProjectionBinding, RegistryBuilder, ServiceContract,
};
use crate::error::{ConfigError, EndpointError, PublishError, SourceError};
use crate::gateway::ConnectionGateway;
use crate::merge::MergedSource;
use crate::ports::AppendReceipt;
use crate::publisher::Publisher;
use crate::source::Source;
use crate::subscription::Subscription;

/// The connection an endpoint runs on.
enum ConnectionLease {
    /// Opened for this endpoint; closed with it.
    Owned(Arc<ConnectionGateway>),
    /// Borrowed from a `ConnectionScope`; left open.
    Shared(Arc<ConnectionGateway>),
}

impl ConnectionLease {
    fn gateway(&self) -> &Arc<ConnectionGateway> {
        match self {
            ConnectionLease::Owned(gateway) | ConnectionLease::Shared(gateway) => gateway,
        }
    }

    fn release(&self) {
        match self {
            ConnectionLease::Owned(gateway) => gateway.close(),
            ConnectionLease::Shared(_) => {}
        }
    }

    fn is_owned(&self) -> bool {
        matches!(self, ConnectionLease::Owned(_))
    }
}

struct Registries<C: ServiceContract> {
    commands: Arc<DeserializerRegistry<C::Command>>,
    events: Arc<DeserializerRegistry<C::Event>>,
    requests: Arc<DeserializerRegistry<C::Request>>,
    responses: Arc<DeserializerRegistry<C::Response>>,
    projections: Vec<(StreamName, Arc<DeserializerRegistry<C::Event>>)>,
}

impl<C: ServiceContract> Registries<C> {
    fn build(config: &EndpointConfig<C>) -> Result<Self, ConfigError> {
        let format = config.payload_format;
        let filter = config.type_filter.clone();

        let projections: Vec<_> = config
            .projections
            .iter()
            .map(|binding| Self::projection(binding).map(|r| (binding.stream().clone(), r)))
            .collect::<Result<_, ConfigError>>()?;

        Ok(Self {
            commands: Arc::new(
                RegistryBuilder::new(format)
                    .registrations(config.catalog.commands.iter().cloned())
                    .filter(filter.clone())
                    .build()?,
            ),
            events: Arc::new(
                RegistryBuilder::new(format)
                    .registrations(config.catalog.events.iter().cloned())
                    .filter(filter.clone())
                    .build()?,
            ),
            requests: Arc::new(
                RegistryBuilder::new(format)
                    .registrations(config.catalog.requests.iter().cloned())
                    .filter(filter.clone())
                    .build()?,
            ),
            responses: Arc::new(
                RegistryBuilder::new(format)
                    .registrations(config.catalog.responses.iter().cloned())
                    .filter(filter)
                    .build()?,
            ),
            projections,
        })
    }

    /// Projections hold a single JSON type and ignore the type filter.
    fn projection(
        binding: &ProjectionBinding<C::Event>,
    ) -> Result<Arc<DeserializerRegistry<C::Event>>, ConfigError> {
        RegistryBuilder::new(PayloadFormat::Json)
            .registration(binding.registration().clone())
            .build()
            .map(Arc::new)
    }
}

/// Builds the endpoint of one logical service. Single use.
pub struct EndpointProvider<C: ServiceContract> {
    config: EndpointConfig<C>,
    registries: Registries<C>,
    handed_out: AtomicBool,
}

impl<C: ServiceContract> EndpointProvider<C> {
    /// Validate the configuration and build the deserializer registries.
    ///
    /// No I/O happens here; the connection opens on first publish or
    /// subscribe.
    ///
    /// # Errors
    ///
    /// Any `ConfigError`, including duplicate type tags.
    pub fn new(config: EndpointConfig<C>) -> Result<Self, ConfigError> {
        config.validate()?;
        let registries = Registries::build(&config)?;
        debug!(
            service = %config.service_name,
            commands = registries.commands.len(),
            events = registries.events.len(),
            requests = registries.requests.len(),
            responses = registries.responses.len(),
            projections = registries.projections.len(),
            "Endpoint provider configured"
        );
        Ok(Self {
            config,
            registries,
            handed_out: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    /// Whether an endpoint has already been created.
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.handed_out.load(Ordering::Acquire)
    }

    /// Create the server-side endpoint.
    ///
    /// # Errors
    ///
    /// `EndpointError::AlreadyCreated` if this provider already created an
    /// endpoint of either kind.
    pub fn create_endpoint(&self) -> Result<ServiceEndpoint<C>, EndpointError> {
        let lease = self.lease()?;
        self.claim()?;
        let gateway = lease.gateway();

        let endpoint = ServiceEndpoint {
            service_name: self.config.service_name.clone(),
            commands: self.source(gateway, Role::Commands, &self.registries.commands),
            requests: self.source(gateway, Role::Requests, &self.registries.requests),
            events: self.publisher(gateway, Role::Events),
            responses: self.publisher(gateway, Role::Responses),
            lease,
            disposed: AtomicBool::new(false),
        };
        info!(
            service = %endpoint.service_name,
            owned_connection = endpoint.lease.is_owned(),
            "Service endpoint created"
        );
        Ok(endpoint)
    }

    /// Create the client-side endpoint.
    ///
    /// # Errors
    ///
    /// `EndpointError::AlreadyCreated` if this provider already created an
    /// endpoint of either kind.
    pub fn create_endpoint_client(&self) -> Result<ServiceEndpointClient<C>, EndpointError> {
        let lease = self.lease()?;
        self.claim()?;
        let gateway = lease.gateway();

        let events = self
            .registries
            .projections
            .iter()
            .fold(
                MergedSource::new(self.source(gateway, Role::Events, &self.registries.events)),
                |merged, (stream, registry)| {
                    merged.with_projection(
                        Source::new(stream.clone(), Arc::clone(gateway), Arc::clone(registry))
                            .with_filter(self.config.property_filter.clone())
                            .with_metrics(Arc::clone(&self.config.metrics)),
                    )
                },
            );

        let client = ServiceEndpointClient {
            service_name: self.config.service_name.clone(),
            events,
            responses: self.source(gateway, Role::Responses, &self.registries.responses),
            commands: self.publisher(gateway, Role::Commands),
            requests: self.publisher(gateway, Role::Requests),
            lease,
            disposed: AtomicBool::new(false),
        };
        info!(
            service = %client.service_name,
            projections = client.events.projections().len(),
            owned_connection = client.lease.is_owned(),
            "Service endpoint client created"
        );
        Ok(client)
    }

    fn claim(&self) -> Result<(), EndpointError> {
        if self.handed_out.swap(true, Ordering::AcqRel) {
            return Err(EndpointError::AlreadyCreated {
                service: self.config.service_name.clone(),
            });
        }
        Ok(())
    }

    fn lease(&self) -> Result<ConnectionLease, ConfigError> {
        if let Some(scope) = &self.config.scope {
            return Ok(ConnectionLease::Shared(Arc::clone(scope.gateway())));
        }

        let service = || self.config.service_name.clone();
        let descriptor = self
            .config
            .descriptor
            .clone()
            .ok_or_else(|| ConfigError::MissingConnection { service: service() })?;
        let connector = self
            .config
            .connector
            .clone()
            .ok_or_else(|| ConfigError::MissingConnector { service: service() })?;

        let gateway = ConnectionGateway::new(descriptor, connector)
            .with_policy(self.config.failure_policy())
            .with_connect_timeout(self.config.connect_timeout())
            .with_metrics(Arc::clone(&self.config.metrics));
        Ok(ConnectionLease::Owned(Arc::new(gateway)))
    }

    fn stream(&self, role: Role) -> StreamName {
        StreamName::for_role(&self.config.service_name, role)
    }

    fn source<M: Send + 'static>(
        &self,
        gateway: &Arc<ConnectionGateway>,
        role: Role,
        registry: &Arc<DeserializerRegistry<M>>,
    ) -> Source<M> {
        Source::new(self.stream(role), Arc::clone(gateway), Arc::clone(registry))
            .with_filter(self.config.property_filter.clone())
            .with_metrics(Arc::clone(&self.config.metrics))
    }

    fn publisher<M>(&self, gateway: &Arc<ConnectionGateway>, role: Role) -> Publisher<M>
    where
        M: Message + Serialize,
    {
        Publisher::new(
            self.stream(role),
            Arc::clone(gateway),
            self.config.payload_format,
        )
        .with_property_provider(self.config.property_provider.clone())
        .with_metrics(Arc::clone(&self.config.metrics))
    }
}

/// Server side of a service: consumes commands and requests, emits events
/// and responses.
pub struct ServiceEndpoint<C: ServiceContract> {
    service_name: String,
    commands: Source<C::Command>,
    requests: Source<C::Request>,
    events: Publisher<C::Event>,
    responses: Publisher<C::Response>,
    lease: ConnectionLease,
    disposed: AtomicBool,
}

impl<C: ServiceContract> ServiceEndpoint<C> {
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Publish an event.
    ///
    /// # Errors
    ///
    /// See `Publisher::publish`.
    pub async fn publish(&self, event: &C::Event) -> Result<AppendReceipt, PublishError> {
        self.events.publish(event).await
    }

    /// Publish a response.
    ///
    /// # Errors
    ///
    /// See `Publisher::publish`.
    pub async fn reply(&self, response: &C::Response) -> Result<AppendReceipt, PublishError> {
        self.responses.publish(response).await
    }

    /// Live feed of incoming commands.
    ///
    /// # Errors
    ///
    /// See `Source::subscribe`.
    pub async fn commands(&self) -> Result<Subscription<C::Command>, SourceError> {
        self.commands.subscribe().await
    }

    /// Live feed of incoming requests.
    ///
    /// # Errors
    ///
    /// See `Source::subscribe`.
    pub async fn requests(&self) -> Result<Subscription<C::Request>, SourceError> {
        self.requests.subscribe().await
    }

    #[must_use]
    pub fn command_source(&self) -> &Source<C::Command> {
        &self.commands
    }

    #[must_use]
    pub fn request_source(&self) -> &Source<C::Request> {
        &self.requests
    }

    #[must_use]
    pub fn event_publisher(&self) -> &Publisher<C::Event> {
        &self.events
    }

    #[must_use]
    pub fn response_publisher(&self) -> &Publisher<C::Response> {
        &self.responses
    }

    /// Dispose the publishers and close an endpoint-local connection.
    /// Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.events.dispose();
        self.responses.dispose();
        self.lease.release();
        info!(service = %self.service_name, "Service endpoint disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl<C: ServiceContract> Drop for ServiceEndpoint<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Client side of a service: sends commands and requests, consumes events
/// and responses.
pub struct ServiceEndpointClient<C: ServiceContract> {
    service_name: String,
    events: MergedSource<C::Event>,
    responses: Source<C::Response>,
    commands: Publisher<C::Command>,
    requests: Publisher<C::Request>,
    lease: ConnectionLease,
    disposed: AtomicBool,
}

impl<C: ServiceContract> ServiceEndpointClient<C> {
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Send a command.
    ///
    /// # Errors
    ///
    /// See `Publisher::publish`.
    pub async fn send(&self, command: &C::Command) -> Result<AppendReceipt, PublishError> {
        self.commands.publish(command).await
    }

    /// Send a request.
    ///
    /// # Errors
    ///
    /// See `Publisher::publish`.
    pub async fn send_request(&self, request: &C::Request) -> Result<AppendReceipt, PublishError> {
        self.requests.publish(request).await
    }

    /// Live feed of events, merged with every projection stream.
    ///
    /// # Errors
    ///
    /// See `MergedSource::subscribe`.
    pub async fn events(&self) -> Result<Subscription<C::Event>, SourceError> {
        self.events.subscribe().await
    }

    /// Live feed of responses.
    ///
    /// # Errors
    ///
    /// See `Source::subscribe`.
    pub async fn responses(&self) -> Result<Subscription<C::Response>, SourceError> {
        self.responses.subscribe().await
    }

    #[must_use]
    pub fn event_source(&self) -> &MergedSource<C::Event> {
        &self.events
    }

    #[must_use]
    pub fn response_source(&self) -> &Source<C::Response> {
        &self.responses
    }

    #[must_use]
    pub fn command_publisher(&self) -> &Publisher<C::Command> {
        &self.commands
    }

    #[must_use]
    pub fn request_publisher(&self) -> &Publisher<C::Request> {
        &self.requests
    }

    /// Dispose the publishers and close an endpoint-local connection.
    /// Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.commands.dispose();
        self.requests.dispose();
        self.lease.release();
        info!(service = %self.service_name, "Service endpoint client disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl<C: ServiceContract> Drop for ServiceEndpointClient<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}
