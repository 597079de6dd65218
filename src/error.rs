//! Error types for the chat synchronization core.

use thiserror::Error;

/// Errors surfaced by the sync components.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP request failed before a response was produced.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status. `detail` carries the
    /// response body (validation messages and the like) verbatim.
    #[error("backend returned status {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, trimmed.
        detail: String,
    },

    /// Response body could not be decoded.
    #[error("response decoding failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// Response decoded but did not match any known envelope shape.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// The auth collaborator could not supply a bearer credential.
    #[error("auth credential unavailable: {0}")]
    Auth(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Base or endpoint URL is invalid.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// An operation requiring a selected conversation ran without one.
    #[error("no active conversation")]
    NoActiveConversation,

    /// The referenced message is not in the local view (or not retryable).
    #[error("unknown or non-retryable message: {0}")]
    UnknownMessage(String),
}

impl ChatError {
    /// Whether this failure is expected to self-heal on the next poll tick.
    ///
    /// Transient failures keep prior state and surface as a non-blocking
    /// status; everything else needs caller action.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(
            ChatError::Status {
                status: 503,
                detail: String::new()
            }
            .is_transient()
        );
        assert!(
            ChatError::Status {
                status: 429,
                detail: String::new()
            }
            .is_transient()
        );
        assert!(
            !ChatError::Status {
                status: 422,
                detail: "participants required".to_owned()
            }
            .is_transient()
        );
        assert!(!ChatError::NoActiveConversation.is_transient());
        assert!(!ChatError::Auth("expired".to_owned()).is_transient());
    }

    #[test]
    fn test_status_detail_in_display() {
        let err = ChatError::Status {
            status: 422,
            detail: "title is required".to_owned(),
        };
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("title is required"));
    }
}
