//! # Signaling message serializer
//!
//! The exact inverse of [`crate::parser`]: every message the parser accepts
//! in canonical form serializes back to the same line. The one message that
//! has no wire form is a SETUP with [`FaxMode::Unknown`], which is reported as
//! an encoding error instead of being sent with a made-up mode token.

use std::fmt::Write;

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::types::message::{FaxMode, Message};
use crate::MAX_MESSAGE_LEN;

/// Serialize a message to its CRLF-terminated wire form
pub fn serialize_message(message: &Message) -> Result<Bytes> {
    validate(message)?;

    let mut buf = BytesMut::with_capacity(64);
    write!(buf, "{}\r\n", message)
        .map_err(|e| Error::encoding(format!("formatting failed: {}", e)))?;

    if buf.len() > MAX_MESSAGE_LEN {
        return Err(Error::encoding(format!(
            "{} message is {} bytes, limit is {}",
            message.message_type(),
            buf.len(),
            MAX_MESSAGE_LEN
        )));
    }

    Ok(buf.freeze())
}

fn validate(message: &Message) -> Result<()> {
    if let Message::Setup(setup) = message {
        match (setup.mode, setup.dst) {
            (FaxMode::Unknown, _) => {
                return Err(Error::encoding("SETUP with unknown fax mode has no wire form"));
            }
            (FaxMode::GatewayToGateway, None) => {
                return Err(Error::encoding("gateway-to-gateway SETUP needs a destination"));
            }
            (FaxMode::GatewayToTerminal, Some(_)) => {
                return Err(Error::encoding("gateway-to-terminal SETUP takes no destination"));
            }
            _ => {}
        }
    }
    Ok(())
}

impl Message {
    /// Serialize this message to its wire form, see [`serialize_message`]
    pub fn to_bytes(&self) -> Result<Bytes> {
        serialize_message(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::call_id::CallId;
    use crate::types::message::{ErrorKind, Setup};

    fn call(id: &str) -> CallId {
        CallId::new(id).unwrap()
    }

    #[test]
    fn test_serialize_each_type() {
        let setup = Setup::gateway_to_gateway(
            call("c1"),
            "10.0.0.1:5000".parse().unwrap(),
            "10.0.0.2:5002".parse().unwrap(),
        );
        assert_eq!(
            &Message::Setup(setup).to_bytes().unwrap()[..],
            b"SETUP c1 GG 10.0.0.1:5000 10.0.0.2:5002\r\n"
        );
        assert_eq!(
            &Message::ok(call("c1"), "192.0.2.1:37000".parse().unwrap()).to_bytes().unwrap()[..],
            b"OK c1 192.0.2.1:37000\r\n"
        );
        assert_eq!(
            &Message::error(call("c1"), ErrorKind::InvalidMessage).to_bytes().unwrap()[..],
            b"ERROR c1 INVALID_MESSAGE\r\n"
        );
        assert_eq!(&Message::release(call("c1")).to_bytes().unwrap()[..], b"RELEASE c1\r\n");
    }

    #[test]
    fn test_unknown_mode_is_encoding_error() {
        let setup = Setup {
            call_id: call("c1"),
            mode: FaxMode::Unknown,
            src: "10.0.0.1:5000".parse().unwrap(),
            dst: None,
        };
        let err = Message::Setup(setup).to_bytes().unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_inconsistent_setup_is_encoding_error() {
        let mut setup = Setup::gateway_to_terminal(call("c1"), "10.0.0.1:5000".parse().unwrap());
        setup.dst = Some("10.0.0.2:5000".parse().unwrap());
        assert!(Message::Setup(setup).to_bytes().is_err());
    }

    #[test]
    fn test_longest_message_fits() {
        let id = "x".repeat(crate::MAX_CALL_ID_LEN);
        let setup = Setup::gateway_to_gateway(
            call(&id),
            "255.255.255.255:65535".parse().unwrap(),
            "255.255.255.255:65535".parse().unwrap(),
        );
        let bytes = Message::Setup(setup).to_bytes().unwrap();
        assert!(bytes.len() <= MAX_MESSAGE_LEN);
        assert!(bytes.ends_with(b"\r\n"));
    }
}
