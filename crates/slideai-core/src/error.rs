//! Error types for the SlideAI resource manager.

use thiserror::Error;

/// Result type alias using SlideAI's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for resource manager operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller's identity key did not resolve to a known identity
    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    /// Daily usage budget exhausted
    #[error("Daily usage limit reached ({used}/{limit})")]
    QuotaExceeded { used: i64, limit: i64 },

    /// Upload rejected before any storage write (wrong kind or oversize)
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// Backing storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// External analysis operation failed
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Requested file lifecycle transition is not defined
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// A stored value did not decode (unknown status or service name)
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Caller is known but lacks the privilege for an administrative call
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Filesystem call failed outside an explicitly mapped storage step
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is attributable to the caller rather than the system.
    ///
    /// Client errors are surfaced verbatim; everything else is logged and
    /// reported generically by the transport layer.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::IdentityNotFound(_)
                | Error::QuotaExceeded { .. }
                | Error::UnsupportedInput(_)
                | Error::InvalidTransition { .. }
                | Error::InvalidInput(_)
                | Error::Forbidden(_)
        )
    }
}
