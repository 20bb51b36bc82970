//! Call identifiers
//!
//! A call-id is an opaque token chosen by the signaling peer. It correlates the
//! two media legs of one call and is echoed in every reply about that call.
//! No escaping exists on the wire, so a call-id can never contain whitespace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest accepted call-id, in bytes
pub const MAX_CALL_ID_LEN: usize = 31;

/// Call-id used in replies to messages whose own call-id could not be read
pub const PLACEHOLDER_CALL_ID: &str = "0";

/// Validated call identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CallId(String);

impl CallId {
    /// Create a call-id, rejecting empty, oversize or whitespace-bearing values
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();

        if value.is_empty() {
            return Err(Error::InvalidCallId { value, reason: "empty".into() });
        }
        if value.len() > MAX_CALL_ID_LEN {
            let reason = format!("longer than {} bytes", MAX_CALL_ID_LEN);
            return Err(Error::InvalidCallId { value, reason });
        }
        if !value.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(Error::InvalidCallId {
                value,
                reason: "contains whitespace or non-printable characters".into(),
            });
        }

        Ok(Self(value))
    }

    /// The call-id sent when the real one is unknown
    pub fn placeholder() -> Self {
        Self(PLACEHOLDER_CALL_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CallId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for CallId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for CallId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CallId> for String {
    fn from(id: CallId) -> Self {
        id.0
    }
}

impl AsRef<str> for CallId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for CallId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CallId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
