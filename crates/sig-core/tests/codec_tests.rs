//! Codec properties: lossless round-trip and parser robustness

use std::net::{Ipv4Addr, SocketAddrV4};

use faxgw_sig_core::prelude::*;
use proptest::prelude::*;

fn call_id_strategy() -> impl Strategy<Value = CallId> {
    "[!-~]{1,31}".prop_map(|s| CallId::new(s).unwrap())
}

fn addr_strategy() -> impl Strategy<Value = SocketAddrV4> {
    (any::<u32>(), any::<u16>()).prop_map(|(ip, port)| SocketAddrV4::new(Ipv4Addr::from(ip), port))
}

fn message_strategy() -> impl Strategy<Value = Message> {
    let kind = prop_oneof![
        Just(ErrorKind::Internal),
        Just(ErrorKind::Unknown),
        Just(ErrorKind::InvalidMessage),
    ];

    prop_oneof![
        (call_id_strategy(), addr_strategy(), addr_strategy())
            .prop_map(|(id, src, dst)| Message::Setup(Setup::gateway_to_gateway(id, src, dst))),
        (call_id_strategy(), addr_strategy())
            .prop_map(|(id, src)| Message::Setup(Setup::gateway_to_terminal(id, src))),
        (call_id_strategy(), addr_strategy()).prop_map(|(id, addr)| Message::ok(id, addr)),
        (call_id_strategy(), kind).prop_map(|(id, kind)| Message::error(id, kind)),
        call_id_strategy().prop_map(Message::release),
    ]
}

proptest! {
    #[test]
    fn prop_serialize_then_parse_is_identity(message in message_strategy()) {
        let wire = message.to_bytes().unwrap();
        prop_assert!(wire.len() <= MAX_MESSAGE_LEN);
        prop_assert_eq!(parse_message(&wire).unwrap(), message);
    }

    #[test]
    fn prop_parser_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..300)) {
        let _ = parse_message(&bytes);
    }
}

#[test]
fn test_robustness_cases_are_parse_errors() {
    for input in [&b""[..], b"GARBAGE", b"SETUP callA GG notanip:80 1.2.3.4:80"] {
        match parse_message(input) {
            Err(Error::Parse { .. }) => {}
            other => panic!("{:?} parsed as {:?}", String::from_utf8_lossy(input), other),
        }
    }
}

#[test]
fn test_unknown_mode_setup_does_not_round_trip() {
    let parsed = parse_message(b"SETUP c1 XY 10.0.0.1:5000\r\n").unwrap();
    assert!(matches!(&parsed, Message::Setup(s) if s.mode == FaxMode::Unknown));
    assert!(matches!(parsed.to_bytes(), Err(Error::Encoding { .. })));
}

#[test]
fn test_non_ascii_datagram_rejected() {
    assert!(parse_message(&[0xff, 0xfe, b' ', b'x']).is_err());
}
