//! Error types for bottlemail.

use thiserror::Error;

/// Common error type for bottlemail.
#[derive(Error, Debug)]
pub enum BottleError {
    /// A required field is missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested send time is not strictly in the future.
    #[error("send time must be in the future")]
    InvalidTime,

    /// Too many outstanding unconfirmed bottles for one address.
    #[error("too many unconfirmed bottles for this address")]
    RateLimited,

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The outbound mail provider rejected or failed a delivery.
    #[error("mail delivery failed: {0}")]
    DeliveryFailure(String),

    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for BottleError {
    fn from(e: sqlx::Error) -> Self {
        BottleError::Database(e.to_string())
    }
}

/// Result type alias for bottlemail operations.
pub type Result<T> = std::result::Result<T, BottleError>;
