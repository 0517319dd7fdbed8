//! Service contracts and their message catalogs.
//!
//! A `ServiceContract` names the four role types of a service. A
//! `MessageCatalog` lists the concrete types that may appear on each role
//! stream; endpoints build their deserializer registries from it.

use logbus_types::{Message, MessageType, StreamName};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::registry::Registration;

/// The role types of one logical service.
pub trait ServiceContract: Send + Sync + 'static {
    type Command: Message + Serialize;
    type Event: Message + Serialize;
    type Request: Message + Serialize;
    type Response: Message + Serialize;
}

/// Concrete types registered per role.
pub struct MessageCatalog<C: ServiceContract> {
    pub(crate) commands: Vec<Registration<C::Command>>,
    pub(crate) events: Vec<Registration<C::Event>>,
    pub(crate) requests: Vec<Registration<C::Request>>,
    pub(crate) responses: Vec<Registration<C::Response>>,
}

impl<C: ServiceContract> MessageCatalog<C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            events: Vec::new(),
            requests: Vec::new(),
            responses: Vec::new(),
        }
    }

    #[must_use]
    pub fn command<T>(mut self) -> Self
    where
        T: MessageType + DeserializeOwned + Into<C::Command>,
    {
        self.commands.push(Registration::of::<T>());
        self
    }

    #[must_use]
    pub fn event<T>(mut self) -> Self
    where
        T: MessageType + DeserializeOwned + Into<C::Event>,
    {
        self.events.push(Registration::of::<T>());
        self
    }

    #[must_use]
    pub fn request<T>(mut self) -> Self
    where
        T: MessageType + DeserializeOwned + Into<C::Request>,
    {
        self.requests.push(Registration::of::<T>());
        self
    }

    #[must_use]
    pub fn response<T>(mut self) -> Self
    where
        T: MessageType + DeserializeOwned + Into<C::Response>,
    {
        self.responses.push(Registration::of::<T>());
        self
    }

    /// Number of registrations across all roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len() + self.events.len() + self.requests.len() + self.responses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: ServiceContract> Default for MessageCatalog<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ServiceContract> Clone for MessageCatalog<C> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            events: self.events.clone(),
            requests: self.requests.clone(),
            responses: self.responses.clone(),
        }
    }
}

/// An externally materialized stream merged into a client's event feed.
///
/// Projection payloads are always JSON, whatever the endpoint's format.
pub struct ProjectionBinding<E> {
    stream: StreamName,
    registration: Registration<E>,
}

impl<E> ProjectionBinding<E> {
    /// Bind stream `stream` to concrete event type `T`.
    #[must_use]
    pub fn new<T>(stream: impl Into<String>) -> Self
    where
        T: MessageType + DeserializeOwned + Into<E>,
    {
        Self {
            stream: StreamName::external(stream),
            registration: Registration::of::<T>(),
        }
    }

    #[must_use]
    pub fn stream(&self) -> &StreamName {
        &self.stream
    }

    #[must_use]
    pub fn registration(&self) -> &Registration<E> {
        &self.registration
    }
}

impl<E> Clone for ProjectionBinding<E> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            registration: self.registration.clone(),
        }
    }
}

impl<E> std::fmt::Debug for ProjectionBinding<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionBinding")
            .field("stream", &self.stream)
            .field("type_tag", &self.registration.type_tag())
            .finish()
    }
}
