//! Error types for the sync layer.
//!
//! These are the causes carried by [`SyncOutcome::SystemError`]. Business and
//! validation errors are not Rust errors: they are well-formed server answers
//! and surface as their own outcome variants.
//!
//! [`SyncOutcome::SystemError`]: crate::SyncOutcome::SystemError

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure (connection refused, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response. `messages` holds the `errors` of the body, if any.
    #[error("HTTP error {status}: {url}")]
    Status {
        status: u16,
        url: String,
        messages: Vec<String>,
    },

    /// Response body is not JSON.
    #[error("invalid response body: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Fetch response carries neither the entity at its root nor under its
    /// envelope key.
    #[error("the server did not return a {field} for id {id}")]
    MissingEntity { field: String, id: String },

    /// Store or action response lacks the updated entity.
    #[error("the server did not return a {field} after {action}")]
    MissingStoredEntity {
        field: String,
        action: &'static str,
    },

    /// Response lacks a field the protocol requires.
    #[error("the server response has no {0} field")]
    MissingField(&'static str),

    /// The submitted item cannot be sent.
    #[error("invalid item: {0}")]
    InvalidItem(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// HTTP status code, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Status { status, .. } => Some(*status),
            SyncError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
