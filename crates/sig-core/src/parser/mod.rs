//! # Signaling message parser
//!
//! Parsing runs in two steps. The message type and call-id tokens are read
//! first; the remainder of the line is then handed to the payload parser for
//! that type. Once the call-id is known every later failure carries it, so a
//! reply to a malformed request can still name the caller's call.
//!
//! A single trailing CRLF (or bare LF) is accepted, as is trailing blank
//! space. Anything else left over after the payload is an error.

pub mod tokens;

use std::net::SocketAddrV4;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{space0, space1},
    combinator::{all_consuming, eof, opt},
    sequence::{preceded, terminated, tuple},
    Finish,
};

use crate::error::{Error, Result};
use crate::types::call_id::CallId;
use crate::types::message::{
    ErrorKind, ErrorReply, FaxMode, Message, MessageType, OkReply, Release, Setup,
};
use crate::MAX_MESSAGE_LEN;

use tokens::{ip_port, spaced_token, token, ParseResult};

/// Parse one signaling message from a datagram
pub fn parse_message(datagram: &[u8]) -> Result<Message> {
    if datagram.is_empty() {
        return Err(Error::parse("empty message"));
    }
    if datagram.len() > MAX_MESSAGE_LEN {
        return Err(Error::parse(format!(
            "message of {} bytes exceeds the {} byte limit",
            datagram.len(),
            MAX_MESSAGE_LEN
        )));
    }

    let line = std::str::from_utf8(datagram)
        .map_err(|_| Error::parse("message is not valid ASCII"))?;

    let (payload, (type_token, call_id_token)) = tuple((token, spaced_token))(line)
        .finish()
        .map_err(|_| Error::parse("expected <type> <call-id>"))?;

    let message_type: MessageType = type_token.parse()?;
    let call_id = CallId::new(call_id_token)
        .map_err(|e| Error::parse(e.to_string()))?;

    let parsed = match message_type {
        MessageType::Setup => parse_setup(payload).map(|(mode, src, dst)| {
            Message::Setup(Setup { call_id: call_id.clone(), mode, src, dst })
        }),
        MessageType::Ok => parse_ok(payload).map(|addr| {
            Message::Ok(OkReply { call_id: call_id.clone(), addr })
        }),
        MessageType::Error => parse_error(payload).map(|kind| {
            Message::Error(ErrorReply { call_id: call_id.clone(), kind })
        }),
        MessageType::Release => parse_release(payload).map(|_| {
            Message::Release(Release { call_id: call_id.clone() })
        }),
    };

    parsed.ok_or_else(|| {
        Error::parse_for(call_id, format!("malformed {} payload", message_type))
    })
}

/// Optional blank space and line terminator, then end of input
fn line_end(input: &str) -> ParseResult<'_, ()> {
    let (rest, _) = tuple((space0, opt(alt((tag("\r\n"), tag("\n")))), eof))(input)?;
    Ok((rest, ()))
}

fn payload<'a, O>(
    parser: impl FnMut(&'a str) -> ParseResult<'a, O>,
    input: &'a str,
) -> Option<O> {
    all_consuming(terminated(parser, line_end))(input)
        .finish()
        .ok()
        .map(|(_, out)| out)
}

// ` <mode> <src> [<dst>]`; the destination is required for GG and absent for GT
fn parse_setup(input: &str) -> Option<(FaxMode, SocketAddrV4, Option<SocketAddrV4>)> {
    let (mode, src, dst) = payload(
        tuple((
            spaced_token,
            preceded(space1, ip_port),
            opt(preceded(space1, ip_port)),
        )),
        input,
    )?;

    let mode = FaxMode::from_token(mode);
    match (mode, dst) {
        (FaxMode::GatewayToGateway, None) => None,
        (FaxMode::GatewayToTerminal, Some(_)) => None,
        _ => Some((mode, src, dst)),
    }
}

fn parse_ok(input: &str) -> Option<SocketAddrV4> {
    payload(preceded(space1, ip_port), input)
}

fn parse_error(input: &str) -> Option<ErrorKind> {
    payload(spaced_token, input).map(ErrorKind::from_token)
}

fn parse_release(input: &str) -> Option<()> {
    payload(|i| Ok((i, ())), input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_setup_gg() {
        let msg = parse_message(b"SETUP callA GG 1.2.3.4:80 5.6.7.8:90\r\n").unwrap();
        let expected = Setup::gateway_to_gateway(
            CallId::new("callA").unwrap(),
            "1.2.3.4:80".parse().unwrap(),
            "5.6.7.8:90".parse().unwrap(),
        );
        assert_eq!(msg, Message::Setup(expected));
    }

    #[test]
    fn test_parse_setup_gt_without_crlf() {
        let msg = parse_message(b"SETUP call1 GT 10.0.0.1:5000").unwrap();
        let expected = Setup::gateway_to_terminal(
            CallId::new("call1").unwrap(),
            "10.0.0.1:5000".parse().unwrap(),
        );
        assert_eq!(msg, Message::Setup(expected));
    }

    #[test]
    fn test_unknown_mode_is_not_an_error() {
        let msg = parse_message(b"SETUP c2 T38 1.2.3.4:80\r\n").unwrap();
        match msg {
            Message::Setup(setup) => {
                assert_eq!(setup.mode, FaxMode::Unknown);
                assert_eq!(setup.dst, None);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_mode_address_count_mismatch() {
        assert!(parse_message(b"SETUP c3 GG 1.2.3.4:80\r\n").is_err());
        assert!(parse_message(b"SETUP c3 GT 1.2.3.4:80 5.6.7.8:90\r\n").is_err());
    }

    #[test]
    fn test_parse_release_and_replies() {
        assert_eq!(
            parse_message(b"RELEASE call1\r\n").unwrap(),
            Message::release(CallId::new("call1").unwrap())
        );
        assert_eq!(
            parse_message(b"OK call1 192.0.2.1:37000\r\n").unwrap(),
            Message::ok(CallId::new("call1").unwrap(), "192.0.2.1:37000".parse().unwrap())
        );
        assert_eq!(
            parse_message(b"ERROR call1 SOMETHING_ELSE\r\n").unwrap(),
            Message::error(CallId::new("call1").unwrap(), ErrorKind::Unknown)
        );
    }

    #[test]
    fn test_payload_error_keeps_call_id() {
        let err = parse_message(b"SETUP callA GG notanip:80 1.2.3.4:80\r\n").unwrap_err();
        assert_eq!(err.call_id().map(CallId::as_str), Some("callA"));
    }

    #[test]
    fn test_header_errors_have_no_call_id() {
        for bad in [&b""[..], b"GARBAGE", b"HELLO call1\r\n", b"SETUP\r\n"] {
            let err = parse_message(bad).unwrap_err();
            assert!(matches!(err, Error::Parse { call_id: None, .. }), "{:?}", err);
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse_message(b"RELEASE call1 now\r\n").is_err());
        assert!(parse_message(b"RELEASE call1\r\n\r\n").is_err());
    }

    #[test]
    fn test_oversize_datagram_rejected() {
        let mut big = b"RELEASE call1".to_vec();
        big.resize(MAX_MESSAGE_LEN + 1, b' ');
        assert!(parse_message(&big).is_err());
    }
}
