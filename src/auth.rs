//! Seam to the external auth collaborator.
//!
//! Token issuance and refresh happen outside this crate; the core only
//! consults the provider for a bearer credential and the local actor's
//! identity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChatResult;
use crate::types::SenderRole;

/// Identity of the local actor, as reported by the auth collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    /// Role used to stamp optimistic echoes and to exclude self-authored
    /// messages from read receipts.
    pub role: SenderRole,
    /// Display name, if known.
    pub display_name: Option<String>,
}

impl LocalIdentity {
    /// Build an identity for the given role.
    #[must_use]
    pub const fn new(role: SenderRole) -> Self {
        Self {
            role,
            display_name: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Supplier of bearer credentials and the local identity.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current bearer credential for the backend API.
    ///
    /// # Errors
    /// Returns an error if no credential is available (e.g. the external
    /// session expired and refresh has not completed).
    async fn bearer_token(&self) -> ChatResult<String>;

    /// Identity of the local actor.
    fn identity(&self) -> LocalIdentity;
}

/// Provider backed by a fixed token, for embedding shells that manage the
/// credential lifecycle themselves.
pub struct StaticAuth {
    token: String,
    identity: LocalIdentity,
}

impl StaticAuth {
    /// Build a provider from a token and the local actor's role.
    #[must_use]
    pub fn new(token: impl Into<String>, role: SenderRole) -> Self {
        Self {
            token: token.into(),
            identity: LocalIdentity::new(role),
        }
    }

    /// Set the local display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.identity = self.identity.with_display_name(name);
        self
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn bearer_token(&self) -> ChatResult<String> {
        Ok(self.token.clone())
    }

    fn identity(&self) -> LocalIdentity {
        self.identity.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_auth() {
        let auth = StaticAuth::new("tok-123", SenderRole::Client).with_display_name("Ana");
        assert_eq!(auth.bearer_token().await.unwrap_or_default(), "tok-123");
        assert_eq!(auth.identity().role, SenderRole::Client);
        assert_eq!(auth.identity().display_name.as_deref(), Some("Ana"));
    }
}
