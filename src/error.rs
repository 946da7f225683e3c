//! Error types for banter.

use thiserror::Error;

/// Common error type for banter.
#[derive(Error, Debug)]
pub enum BanterError {
    /// Authentication error. Refusing a connection is the only case
    /// where this error becomes visible to a client.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Validation error for client-submitted events (bad room name,
    /// empty message, no active room).
    #[error("validation error: {0}")]
    Validation(String),

    /// Database error.
    ///
    /// Wraps errors from the message store; sqlx errors are converted
    /// automatically.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),
}

impl From<sqlx::Error> for BanterError {
    fn from(e: sqlx::Error) -> Self {
        BanterError::Database(e.to_string())
    }
}

/// Result type alias for banter operations.
pub type Result<T> = std::result::Result<T, BanterError>;
