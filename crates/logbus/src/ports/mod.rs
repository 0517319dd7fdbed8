//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - what endpoints expose to callers
//! - Driven Ports (outbound) - what the adapter needs from a log store

pub mod inbound;
pub mod outbound;

pub use inbound::{MessagePublisher, MessageSource};
pub use outbound::{AppendReceipt, ConnectionDescriptor, Connector, LogConnection, RecordStream};
