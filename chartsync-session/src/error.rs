//! Error types for session handling.

use thiserror::Error;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Token does not have the `header.payload.signature` shape.
    #[error("invalid session token: {0}")]
    InvalidToken(String),

    /// Token payload is not valid base64.
    #[error("invalid token payload encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Token payload is not the expected JSON.
    #[error("invalid token payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
