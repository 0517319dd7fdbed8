//! # LogBus Types
//!
//! Types shared between the stream adapter and the applications that define
//! message contracts on top of it.
//!
//! ## Design Principles
//!
//! - **Records are immutable**: a `StreamRecord` is identified by its
//!   `record_id` and never changes after it is appended.
//! - **Metadata is optional**: an empty `PropertyMap` is never written to the
//!   wire; absent metadata reads back as an empty map.
//! - **Tags, not reflection**: every concrete message type names itself with a
//!   static type tag, which is what the wire carries.

pub mod errors;
pub mod format;
pub mod message;
pub mod properties;
pub mod record;
pub mod stream;

pub use errors::CodecError;
pub use format::PayloadFormat;
pub use message::{Message, MessageType, MessageTypeInfo};
pub use properties::PropertyMap;
pub use record::{ProposedRecord, StreamRecord};
pub use stream::{Role, StreamName};
