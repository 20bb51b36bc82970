//! # Signaling messages
//!
//! [`Message`] is the sum type of everything that can arrive at or leave the
//! control port. Each variant owns its payload, so parsing, serializing and
//! handling a message is an exhaustive `match` with no casts between message
//! shapes.
//!
//! | Variant   | Direction         | Payload                                  |
//! |-----------|-------------------|------------------------------------------|
//! | `Setup`   | peer -> gateway   | fax mode, source and destination address |
//! | `Ok`      | gateway -> peer   | local media address of the inbound leg   |
//! | `Error`   | gateway -> peer   | error kind                               |
//! | `Release` | peer -> gateway   | none                                     |
//!
//! Messages are plain values. They hold no reference to the sessions a call
//! creates, and can be built, printed and dropped independently of them.
//!
//! ## Examples
//!
//! ```rust
//! use faxgw_sig_core::{Message, Setup, ErrorKind};
//!
//! let setup = Setup::gateway_to_gateway(
//!     "call7".parse().unwrap(),
//!     "10.0.0.1:5000".parse().unwrap(),
//!     "10.0.0.2:6000".parse().unwrap(),
//! );
//! let msg = Message::Setup(setup);
//! assert_eq!(msg.to_string(), "SETUP call7 GG 10.0.0.1:5000 10.0.0.2:6000");
//!
//! let err = Message::error("call7".parse().unwrap(), ErrorKind::Internal);
//! assert_eq!(err.to_string(), "ERROR call7 INTERNAL_ERR");
//! ```

use std::fmt;
use std::net::SocketAddrV4;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::call_id::CallId;

/// Kind of a signaling message, as named by its first token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Setup,
    Ok,
    Error,
    Release,
}

impl MessageType {
    /// Wire token for this message type
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Setup => "SETUP",
            MessageType::Ok => "OK",
            MessageType::Error => "ERROR",
            MessageType::Release => "RELEASE",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SETUP" => Ok(MessageType::Setup),
            "OK" => Ok(MessageType::Ok),
            "ERROR" => Ok(MessageType::Error),
            "RELEASE" => Ok(MessageType::Release),
            other => Err(Error::parse(format!("unknown message type {:?}", other))),
        }
    }
}

/// How the two legs of a fax call are terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaxMode {
    /// Both legs speak T.38 to another gateway (`GG`)
    GatewayToGateway,
    /// The far leg talks directly to a fax terminal (`GT`)
    GatewayToTerminal,
    /// Any other mode token. Parsed without error and left to the caller;
    /// it has no wire form of its own.
    Unknown,
}

impl FaxMode {
    /// Token used on the wire; `UN` only appears in printed messages
    pub fn as_str(&self) -> &'static str {
        match self {
            FaxMode::GatewayToGateway => "GG",
            FaxMode::GatewayToTerminal => "GT",
            FaxMode::Unknown => "UN",
        }
    }

    /// Map a mode token, falling back to [`FaxMode::Unknown`]
    pub fn from_token(token: &str) -> Self {
        match token {
            "GG" => FaxMode::GatewayToGateway,
            "GT" => FaxMode::GatewayToTerminal,
            _ => FaxMode::Unknown,
        }
    }
}

impl fmt::Display for FaxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error kinds carried by `ERROR` replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The gateway could not set up the call (`INTERNAL_ERR`)
    Internal,
    /// Unclassified failure, also used for unrecognised error tokens (`UNKNOWN_ERR`)
    Unknown,
    /// The request itself could not be parsed (`INVALID_MESSAGE`)
    InvalidMessage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Internal => "INTERNAL_ERR",
            ErrorKind::Unknown => "UNKNOWN_ERR",
            ErrorKind::InvalidMessage => "INVALID_MESSAGE",
        }
    }

    pub fn from_token(token: &str) -> Self {
        match token {
            "INTERNAL_ERR" => ErrorKind::Internal,
            "INVALID_MESSAGE" => ErrorKind::InvalidMessage,
            _ => ErrorKind::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to set up a fax call between two media endpoints
///
/// `dst` is present for gateway-to-gateway calls. A gateway-to-terminal call
/// only names the source; the terminal side is learned from media traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    pub call_id: CallId,
    pub mode: FaxMode,
    pub src: SocketAddrV4,
    pub dst: Option<SocketAddrV4>,
}

impl Setup {
    /// `SETUP <call-id> GG <src> <dst>`
    pub fn gateway_to_gateway(call_id: CallId, src: SocketAddrV4, dst: SocketAddrV4) -> Self {
        Self {
            call_id,
            mode: FaxMode::GatewayToGateway,
            src,
            dst: Some(dst),
        }
    }

    /// `SETUP <call-id> GT <src>`
    pub fn gateway_to_terminal(call_id: CallId, src: SocketAddrV4) -> Self {
        Self {
            call_id,
            mode: FaxMode::GatewayToTerminal,
            src,
            dst: None,
        }
    }
}

/// Successful SETUP reply carrying the gateway's media address for the call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkReply {
    pub call_id: CallId,
    pub addr: SocketAddrV4,
}

/// Failure reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub call_id: CallId,
    pub kind: ErrorKind,
}

/// Request to tear down a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub call_id: CallId,
}

/// A signaling message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Setup(Setup),
    Ok(OkReply),
    Error(ErrorReply),
    Release(Release),
}

impl Message {
    /// Build an `OK` reply
    pub fn ok(call_id: CallId, addr: SocketAddrV4) -> Self {
        Message::Ok(OkReply { call_id, addr })
    }

    /// Build an `ERROR` reply
    pub fn error(call_id: CallId, kind: ErrorKind) -> Self {
        Message::Error(ErrorReply { call_id, kind })
    }

    /// Build a `RELEASE` request
    pub fn release(call_id: CallId) -> Self {
        Message::Release(Release { call_id })
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Setup(_) => MessageType::Setup,
            Message::Ok(_) => MessageType::Ok,
            Message::Error(_) => MessageType::Error,
            Message::Release(_) => MessageType::Release,
        }
    }

    pub fn call_id(&self) -> &CallId {
        match self {
            Message::Setup(m) => &m.call_id,
            Message::Ok(m) => &m.call_id,
            Message::Error(m) => &m.call_id,
            Message::Release(m) => &m.call_id,
        }
    }
}

impl From<Setup> for Message {
    fn from(setup: Setup) -> Self {
        Message::Setup(setup)
    }
}

/// Single-line form without the CRLF terminator, used for logging.
///
/// Unlike [`Message::to_bytes`] this never fails: an unknown-mode SETUP is
/// printed with its `UN` placeholder token.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.message_type(), self.call_id())?;
        match self {
            Message::Setup(setup) => {
                write!(f, " {} {}", setup.mode, setup.src)?;
                if let Some(dst) = setup.dst {
                    write!(f, " {}", dst)?;
                }
                Ok(())
            }
            Message::Ok(ok) => write!(f, " {}", ok.addr),
            Message::Error(err) => write!(f, " {}", err.kind),
            Message::Release(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_tokens() {
        for ty in [MessageType::Setup, MessageType::Ok, MessageType::Error, MessageType::Release] {
            assert_eq!(ty.as_str().parse::<MessageType>().unwrap(), ty);
        }
        assert!("setup".parse::<MessageType>().is_err());
    }

    #[test]
    fn test_unknown_tokens_are_permissive() {
        assert_eq!(FaxMode::from_token("XX"), FaxMode::Unknown);
        assert_eq!(FaxMode::from_token("UN"), FaxMode::Unknown);
        assert_eq!(ErrorKind::from_token("BUSY"), ErrorKind::Unknown);
    }

    #[test]
    fn test_display_unknown_mode() {
        let setup = Setup {
            call_id: CallId::new("c9").unwrap(),
            mode: FaxMode::Unknown,
            src: "1.2.3.4:5".parse().unwrap(),
            dst: None,
        };
        assert_eq!(Message::Setup(setup).to_string(), "SETUP c9 UN 1.2.3.4:5");
    }

    #[test]
    fn test_constructors() {
        let msg = Message::release(CallId::new("c1").unwrap());
        assert_eq!(msg.message_type(), MessageType::Release);
        assert_eq!(msg.call_id(), "c1");
    }
}
