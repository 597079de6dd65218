//! Identifier types for the chat synchronization core.
//!
//! This module is intentionally **type-heavy** and **logic-light**: it
//! provides the two identifier namespaces the sync engine relies on.
//!
//! Conversation ids are opaque strings assigned by the backend and never
//! interpreted locally. Message ids span two namespaces: backend-assigned
//! remote ids and locally generated provisional ids for optimistic echoes.
//! Keeping the namespaces in the type system means an optimistic message can
//! never collide with a server record by construction.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque conversation identifier assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Wrap a backend-assigned identifier.
    #[inline]
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into `String`.
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ConversationId {
    #[inline]
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConversationId {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for ConversationId {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Message identifier spanning the two id namespaces.
///
/// `Remote` ids come from the backend and are the reconciliation key for
/// merges. `Local` ids are generated for optimistic echoes and live only
/// until the matching server record replaces the pending entry (or the user
/// discards a failed one).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageId {
    /// Backend-assigned identifier.
    Remote(String),
    /// Locally generated provisional identifier.
    Local(Uuid),
}

impl MessageId {
    /// Wrap a backend-assigned identifier.
    #[inline]
    #[must_use]
    pub fn remote(raw: impl Into<String>) -> Self {
        Self::Remote(raw.into())
    }

    /// Generate a fresh provisional identifier for an optimistic echo.
    #[inline]
    #[must_use]
    pub fn provisional() -> Self {
        Self::Local(Uuid::new_v4())
    }

    /// Whether this id belongs to the local provisional namespace.
    #[inline]
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Whether this id was assigned by the backend.
    #[inline]
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Borrow the backend identifier, if this is a remote id.
    #[inline]
    #[must_use]
    pub fn as_remote(&self) -> Option<&str> {
        match self {
            Self::Remote(raw) => Some(raw.as_str()),
            Self::Local(_) => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(raw) => f.write_str(raw),
            Self::Local(uuid) => write!(f, "local-{uuid}"),
        }
    }
}
