//! # faxgw signaling core
//!
//! Message model, parser and serializer for the line-oriented control
//! protocol spoken on the gateway's control port.
//!
//! Every message is a single ASCII line terminated by CRLF, made of
//! space-separated tokens:
//!
//! ```text
//! SETUP   <call-id> GG <src-ip>:<src-port> <dst-ip>:<dst-port>
//! SETUP   <call-id> GT <src-ip>:<src-port>
//! OK      <call-id> <ip>:<port>
//! ERROR   <call-id> INTERNAL_ERR | UNKNOWN_ERR | INVALID_MESSAGE
//! RELEASE <call-id>
//! ```
//!
//! ## Examples
//!
//! ```rust
//! use faxgw_sig_core::{parse_message, Message, FaxMode};
//!
//! let msg = parse_message(b"SETUP call1 GT 10.0.0.1:5000\r\n").unwrap();
//! match &msg {
//!     Message::Setup(setup) => {
//!         assert_eq!(setup.call_id.as_str(), "call1");
//!         assert_eq!(setup.mode, FaxMode::GatewayToTerminal);
//!     }
//!     _ => unreachable!(),
//! }
//!
//! let reply = Message::ok("call1".parse().unwrap(), "192.0.2.7:37000".parse().unwrap());
//! assert_eq!(&reply.to_bytes().unwrap()[..], b"OK call1 192.0.2.7:37000\r\n");
//! ```

pub mod error;
pub mod parser;
pub mod serializer;
pub mod types;

pub use error::{Error, Result};
pub use parser::parse_message;
pub use types::call_id::{CallId, MAX_CALL_ID_LEN, PLACEHOLDER_CALL_ID};
pub use types::message::{
    ErrorKind, ErrorReply, FaxMode, Message, MessageType, OkReply, Release, Setup,
};

/// Upper bound, CRLF included, for a serialized signaling message
pub const MAX_MESSAGE_LEN: usize = 256;

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        parse_message, CallId, Error, ErrorKind, ErrorReply, FaxMode, Message, MessageType,
        OkReply, Release, Result, Setup, MAX_MESSAGE_LEN,
    };
}
