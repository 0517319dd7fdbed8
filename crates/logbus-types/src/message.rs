//! # Message Traits
//!
//! A `Message` is any value that can travel over a role stream. Its type tag
//! is the simple name of its concrete variant, which is what readers use to
//! pick a deserializer.
//!
//! Role types are usually enums whose variants wrap concrete message structs
//! and serialize as the inner value:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! #[serde(untagged)]
//! enum OrderEvent {
//!     Created(OrderCreated),
//!     Cancelled(OrderCancelled),
//! }
//! ```

use std::any::Any;

/// A value that can be published to a role stream.
pub trait Message: Send + Sync + 'static {
    /// The tag written to the record's `type_tag` field.
    fn type_tag(&self) -> &str;

    /// Access to the concrete value, for property providers that need it.
    fn as_any(&self) -> &dyn Any;
}

/// A concrete message type with a static tag.
pub trait MessageType {
    /// Simple type name used on the wire.
    const TYPE_TAG: &'static str;

    /// Registration metadata for this type.
    fn type_info() -> MessageTypeInfo
    where
        Self: Sized,
    {
        MessageTypeInfo {
            type_tag: Self::TYPE_TAG,
            type_path: std::any::type_name::<Self>(),
        }
    }
}

/// What a type filter sees when deciding whether to register a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTypeInfo {
    /// Wire tag.
    pub type_tag: &'static str,
    /// Fully qualified Rust path of the type.
    pub type_path: &'static str,
}

impl MessageTypeInfo {
    /// Whether the type lives under the given module path prefix.
    #[must_use]
    pub fn in_module(&self, prefix: &str) -> bool {
        self.type_path.starts_with(prefix)
    }
}

impl dyn Message {
    /// Downcast to a concrete message type.
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
