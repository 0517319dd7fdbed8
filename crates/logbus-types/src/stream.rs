//! # Stream Naming
//!
//! Every service owns one stream per channel role.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four channel roles of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Commands,
    Events,
    Requests,
    Responses,
}

impl Role {
    /// All roles, in a stable order.
    pub const ALL: [Role; 4] = [Role::Commands, Role::Events, Role::Requests, Role::Responses];

    /// Suffix used in stream names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Commands => "Commands",
            Role::Events => "Events",
            Role::Requests => "Requests",
            Role::Responses => "Responses",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of an addressable stream. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamName(String);

impl StreamName {
    /// Stream for a (service, role) pair: `"{service}.{Role}"`.
    #[must_use]
    pub fn for_role(service: &str, role: Role) -> Self {
        Self(format!("{service}.{role}"))
    }

    /// An externally named stream, such as a projection.
    #[must_use]
    pub fn external(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StreamName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
