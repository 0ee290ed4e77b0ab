//! Error types for scrawl-core

use thiserror::Error;

/// Result type alias using scrawl-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in scrawl-core operations
///
/// Every variant carries plain data so one outcome can be handed to several
/// waiters (a shared token refresh, a sync status observer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Caller-correctable input, rejected before any storage or network call
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Connectivity failure or a 5xx response
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// The server rejected the credential (401)
    #[error("Authorization rejected: {0}")]
    Auth(String),

    /// The token pair could not be refreshed; the user must sign in again
    #[error("Session expired, sign in again")]
    SessionExpired,

    /// Local durable store or cookie jar failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Non-retryable API error
    #[error("API error: {message} ({status})")]
    Api { status: u16, message: String },

    /// Response body did not match the endpoint contract
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether a later attempt may succeed without user action.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }

    /// Whether the caller must force re-authentication.
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    pub(crate) fn persistence(context: &str, error: impl std::fmt::Display) -> Self {
        Self::Persistence(format!("{context}: {error}"))
    }
}
