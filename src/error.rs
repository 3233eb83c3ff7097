//! Error types for fedisync
//!
//! All errors surfaced by the engine are converted to `AppError`.
//! Remote failures keep the transport/server error they came from.

use thiserror::Error;

use crate::remote::RemoteError;

/// Engine-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// No signed-in account is available for the call
    #[error("Authentication required")]
    AuthenticationMissing,

    /// Malformed or impossible local state (e.g. missing actor record)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The server answered with something the engine cannot use
    #[error("Bad response: {0}")]
    BadResponse(String),

    /// The server asked us to slow down
    #[error("Request throttled")]
    RequestThrottled,

    /// The poll closed before the vote was recorded
    #[error("Poll has expired")]
    PollExpired,

    /// The actor already has a vote recorded on this poll
    #[error("Already voted in this poll")]
    AlreadyVoted,

    /// Local record not found
    #[error("Record not found")]
    NotFound,

    /// Error reported by the remote API collaborator
    #[error("Remote API error: {0}")]
    Remote(RemoteError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AuthenticationMissing => "authentication_missing",
            AppError::BadRequest(_) => "bad_request",
            AppError::BadResponse(_) => "bad_response",
            AppError::RequestThrottled => "request_throttled",
            AppError::PollExpired => "poll_expired",
            AppError::AlreadyVoted => "already_voted",
            AppError::NotFound => "not_found",
            AppError::Remote(_) => "remote",
            AppError::Database(_) => "database",
            AppError::Migration(_) => "migration",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    /// Report a broken internal invariant.
    ///
    /// Panics in debug builds; release builds log and return `BadRequest`.
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "Local state invariant violated");
        debug_assert!(false, "{message}");
        AppError::BadRequest(message)
    }
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Throttled { .. } => AppError::RequestThrottled,
            other => AppError::Remote(other),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
