//! Error types for Sandgrid
//!
//! This module defines the common error taxonomy used throughout the
//! system. Every variant carries the underlying cause for the logs; the
//! caller only ever sees `http_status_code()` and `client_message()`.

use crate::types::SandboxIdError;
use thiserror::Error;

/// Common result type for Sandgrid operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Sandgrid
#[derive(Debug, Error)]
pub enum Error {
    // Request adapter errors
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid sandbox id: {0}")]
    InvalidSandboxId(#[from] SandboxIdError),

    // Update protocol errors
    #[error("sandbox not found: {0}")]
    SandboxNotFound(String),

    #[error("node unavailable: {node}: {reason}")]
    NodeUnavailable { node: String, reason: String },

    #[error("remote update failed on {node}: {reason}")]
    RemoteUpdateFailed { node: String, reason: String },

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a retryable error
    ///
    /// The protocol never retries internally; callers may re-issue the
    /// request, which is safe because the merge is deterministic.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NodeUnavailable { .. } | Self::RemoteUpdateFailed { .. }
        )
    }

    /// Get HTTP status code for the control-plane API
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::InvalidSandboxId(_) => 400,
            Self::SandboxNotFound(_) => 404,
            Self::NodeUnavailable { .. } | Self::RemoteUpdateFailed { .. } | Self::Internal(_) => {
                500
            }
        }
    }

    /// Caller-safe message. Underlying causes stay in the logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::BadRequest(msg) => format!("Error when parsing request: {msg}"),
            Self::InvalidSandboxId(err) => format!("Error when parsing request: {err}"),
            Self::SandboxNotFound(_) => "Sandbox not found".to_string(),
            Self::NodeUnavailable { .. } => "Failed to connect to sandbox node".to_string(),
            Self::RemoteUpdateFailed { .. } => "Failed to update sandbox metadata".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(
            Error::NodeUnavailable {
                node: "n1".into(),
                reason: "refused".into()
            }
            .is_retryable()
        );
        assert!(!Error::SandboxNotFound("abc".into()).is_retryable());
        assert!(!Error::BadRequest("bad".into()).is_retryable());
    }

    #[test]
    fn test_error_http_status() {
        assert_eq!(Error::BadRequest("x".into()).http_status_code(), 400);
        assert_eq!(Error::SandboxNotFound("x".into()).http_status_code(), 404);
        assert_eq!(
            Error::NodeUnavailable {
                node: "n1".into(),
                reason: "refused".into()
            }
            .http_status_code(),
            500
        );
        assert_eq!(
            Error::RemoteUpdateFailed {
                node: "n1".into(),
                reason: "deadline exceeded".into()
            }
            .http_status_code(),
            500
        );
    }

    #[test]
    fn test_client_message_hides_cause() {
        let err = Error::RemoteUpdateFailed {
            node: "n1".into(),
            reason: "rpc error: unavailable at 10.0.0.7".into(),
        };
        assert_eq!(err.client_message(), "Failed to update sandbox metadata");
        assert!(!err.client_message().contains("10.0.0.7"));
    }
}
