//! Adapters Layer (Driven Adapters)
//!
//! Implementations of the outbound ports.
//!
//! ## Adapters
//!
//! - `InMemoryLogStore` - A process-local append-only store with live
//!   subscriptions, used for single-process deployments and tests
//! - `InMemoryConnector` - Hands out connections to an `InMemoryLogStore`,
//!   with connect counting, delay and failure injection

pub mod memory;

pub use memory::{InMemoryConnection, InMemoryConnector, InMemoryLogStore};
