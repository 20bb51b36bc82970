//! Error types for the signaling codec

use thiserror::Error;

use crate::types::call_id::CallId;

/// Result type for signaling codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing or serializing signaling messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The datagram is not a well-formed signaling message.
    ///
    /// `call_id` is set when the message type and call-id tokens were read
    /// before the failure, so a reply can still echo the caller's call-id.
    #[error("Parse error: {reason}")]
    Parse {
        call_id: Option<CallId>,
        reason: String,
    },

    /// The message cannot be put on the wire
    #[error("Encoding error: {reason}")]
    Encoding { reason: String },

    /// A call-id violates the length or character rules
    #[error("Invalid call-id {value:?}: {reason}")]
    InvalidCallId { value: String, reason: String },
}

impl Error {
    /// Create a parse error without call-id context
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            call_id: None,
            reason: reason.into(),
        }
    }

    /// Create a parse error for a message whose call-id is known
    pub fn parse_for(call_id: CallId, reason: impl Into<String>) -> Self {
        Self::Parse {
            call_id: Some(call_id),
            reason: reason.into(),
        }
    }

    /// Create an encoding error
    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::Encoding {
            reason: reason.into(),
        }
    }

    /// Call-id recovered from a partially parsed message, if any
    pub fn call_id(&self) -> Option<&CallId> {
        match self {
            Self::Parse { call_id, .. } => call_id.as_ref(),
            _ => None,
        }
    }
}
