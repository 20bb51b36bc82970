use thiserror::Error;

/// Result type for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the infrastructure helpers
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or was rejected
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure while reading configuration or setting up logging
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error annotated with component/operation context
    #[error("{0}")]
    Custom(String),

    /// Internal invariant failure
    #[error("Internal error: {0}")]
    Internal(String),
}
