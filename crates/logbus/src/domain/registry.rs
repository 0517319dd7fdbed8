//! # Deserializer Registry
//!
//! Maps a record's type tag to a decoder for one concrete message type,
//! whose result is converted into the role type `M` the source emits.
//!
//! Registries are built once per endpoint from an explicit registration list,
//! optionally narrowed by a type filter, and are read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use logbus_types::{CodecError, MessageType, MessageTypeInfo, PayloadFormat};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ConfigError;

/// Decides whether a registered type takes part in an endpoint's registry.
pub type TypeFilter = Arc<dyn Fn(&MessageTypeInfo) -> bool + Send + Sync>;

type DecodeFn<M> = fn(PayloadFormat, &[u8]) -> Result<M, CodecError>;

fn decode_as<C, M>(format: PayloadFormat, bytes: &[u8]) -> Result<M, CodecError>
where
    C: DeserializeOwned + Into<M>,
{
    format.decode::<C>(bytes).map(Into::into)
}

/// One concrete type registered under role type `M`.
pub struct Registration<M> {
    info: MessageTypeInfo,
    decode: DecodeFn<M>,
}

impl<M> Registration<M> {
    /// Register concrete type `C`, decoded then converted into `M`.
    #[must_use]
    pub fn of<C>() -> Self
    where
        C: MessageType + DeserializeOwned + Into<M>,
    {
        Self {
            info: C::type_info(),
            decode: decode_as::<C, M>,
        }
    }

    #[must_use]
    pub fn info(&self) -> MessageTypeInfo {
        self.info
    }

    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        self.info.type_tag
    }
}

impl<M> Clone for Registration<M> {
    fn clone(&self) -> Self {
        Self {
            info: self.info,
            decode: self.decode,
        }
    }
}

impl<M> fmt::Debug for Registration<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("type_tag", &self.info.type_tag)
            .field("type_path", &self.info.type_path)
            .finish()
    }
}

/// Collects registrations for one registry.
pub struct RegistryBuilder<M> {
    format: PayloadFormat,
    registrations: Vec<Registration<M>>,
    filter: Option<TypeFilter>,
}

impl<M> RegistryBuilder<M> {
    #[must_use]
    pub fn new(format: PayloadFormat) -> Self {
        Self {
            format,
            registrations: Vec::new(),
            filter: None,
        }
    }

    #[must_use]
    pub fn register<C>(self) -> Self
    where
        C: MessageType + DeserializeOwned + Into<M>,
    {
        self.registration(Registration::of::<C>())
    }

    #[must_use]
    pub fn registration(mut self, registration: Registration<M>) -> Self {
        self.registrations.push(registration);
        self
    }

    #[must_use]
    pub fn registrations<I>(mut self, registrations: I) -> Self
    where
        I: IntoIterator<Item = Registration<M>>,
    {
        self.registrations.extend(registrations);
        self
    }

    /// Keep only types the filter accepts.
    #[must_use]
    pub fn filter(mut self, filter: Option<TypeFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Build the registry.
    ///
    /// # Errors
    ///
    /// `ConfigError::DuplicateTypeTag` if two accepted types share a tag.
    pub fn build(self) -> Result<DeserializerRegistry<M>, ConfigError> {
        let mut decoders: HashMap<&'static str, DecodeFn<M>> = HashMap::new();

        for registration in self.registrations {
            if let Some(filter) = &self.filter {
                if !filter(&registration.info) {
                    debug!(
                        type_tag = registration.info.type_tag,
                        type_path = registration.info.type_path,
                        "Type excluded by filter"
                    );
                    continue;
                }
            }

            if decoders
                .insert(registration.info.type_tag, registration.decode)
                .is_some()
            {
                return Err(ConfigError::DuplicateTypeTag {
                    tag: registration.info.type_tag.to_string(),
                });
            }
        }

        Ok(DeserializerRegistry {
            format: self.format,
            decoders,
        })
    }
}

/// Read-only map from type tag to decoder.
pub struct DeserializerRegistry<M> {
    format: PayloadFormat,
    decoders: HashMap<&'static str, DecodeFn<M>>,
}

impl<M> DeserializerRegistry<M> {
    #[must_use]
    pub fn builder(format: PayloadFormat) -> RegistryBuilder<M> {
        RegistryBuilder::new(format)
    }

    /// Decode `bytes` as the type registered under `type_tag`.
    ///
    /// Returns `None` when no type is registered under the tag.
    pub fn decode(&self, type_tag: &str, bytes: &[u8]) -> Option<Result<M, CodecError>> {
        self.decoders
            .get(type_tag)
            .map(|decode| decode(self.format, bytes))
    }

    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.decoders.contains_key(type_tag)
    }

    #[must_use]
    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Registered tags, sorted.
    #[must_use]
    pub fn type_tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.decoders.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

impl<M> fmt::Debug for DeserializerRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeserializerRegistry")
            .field("format", &self.format)
            .field("type_tags", &self.type_tags())
            .finish()
    }
}
