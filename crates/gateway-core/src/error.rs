//! Error types for the gateway core

use std::io;

use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the gateway core
#[derive(Debug, Error)]
pub enum Error {
    /// An id or port pool has no free entry left
    #[error("{pool} pool exhausted")]
    AllocationExhausted { pool: &'static str },

    /// Release of a value that is not currently allocated
    #[error("{pool} {value} released while not allocated")]
    NotOwned { pool: &'static str, value: u32 },

    /// Release of a value outside the pool's range
    #[error("{pool} {value} is outside the pool range")]
    OutOfRange { pool: &'static str, value: u32 },

    /// Signaling parse or encoding failure
    #[error("Signaling error: {0}")]
    Signaling(#[from] faxgw_sig_core::Error),

    /// Socket create/bind/send/receive failure
    #[error("Socket error during {context}: {source}")]
    Socket {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The session table cannot take another call
    #[error("Session table full: {active} of {max} slots in use")]
    CapacityExceeded { active: usize, max: usize },

    /// Mode/direction combination or lifecycle misuse
    #[error("Invalid session: {message}")]
    InvalidSession { message: String },

    /// SETUP asked for a fax mode the gateway does not handle
    #[error("Unsupported fax mode: {mode}")]
    UnsupportedMode { mode: String },

    /// A call with this call-id is already active
    #[error("Call already active: {call_id}")]
    DuplicateCall { call_id: String },

    /// Failure reported by a FaxEngine
    #[error("Fax engine error: {message}")]
    FaxEngine { message: String },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl Error {
    /// Create a socket error for the given operation
    pub fn socket(context: impl Into<String>, source: io::Error) -> Self {
        Self::Socket {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid session error
    pub fn invalid_session(message: impl Into<String>) -> Self {
        Self::InvalidSession {
            message: message.into(),
        }
    }

    /// Create a fax engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::FaxEngine {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Allocator invariant violations: a bug in the caller, not a runtime condition
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::NotOwned { .. } | Self::OutOfRange { .. })
    }
}

impl From<faxgw_infra_common::Error> for Error {
    fn from(e: faxgw_infra_common::Error) -> Self {
        Self::config(e.to_string())
    }
}
