//! Domain Layer
//!
//! Service contracts, deserializer registries and endpoint configuration.
//! Nothing in this layer performs I/O.

pub mod catalog;
pub mod config;
pub mod registry;

pub use catalog::{MessageCatalog, ProjectionBinding, ServiceContract};
pub use config::{
    EndpointConfig, EndpointConfigBuilder, EndpointSettings, PropertyFilter, PropertyProvider,
};
pub use registry::{DeserializerRegistry, Registration, RegistryBuilder, TypeFilter};
