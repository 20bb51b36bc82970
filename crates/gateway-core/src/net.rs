//! Socket and interface helpers

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{Error, Result};

/// Create a non-blocking UDP socket bound to `addr`
pub fn bind_udp(addr: SocketAddrV4) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::socket("create UDP socket", e))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| Error::socket("set non-blocking", e))?;
    socket
        .bind(&SocketAddr::V4(addr).into())
        .map_err(|e| Error::socket(format!("bind {}", addr), e))?;
    Ok(socket.into())
}

/// Local IPv4 address of a bound socket
pub fn local_v4(socket: &UdpSocket) -> Result<SocketAddrV4> {
    match socket.local_addr() {
        Ok(SocketAddr::V4(addr)) => Ok(addr),
        Ok(other) => Err(Error::socket(
            "local address",
            io::Error::new(io::ErrorKind::Unsupported, format!("not IPv4: {}", other)),
        )),
        Err(e) => Err(Error::socket("local address", e)),
    }
}

/// First IPv4 address assigned to the named interface
#[cfg(unix)]
pub fn discover_interface_ip(name: &str) -> Result<Ipv4Addr> {
    let addrs = nix::ifaddrs::getifaddrs()
        .map_err(|e| Error::socket("list interfaces", io::Error::from(e)))?;

    addrs
        .filter(|ifaddr| ifaddr.interface_name == name)
        .filter_map(|ifaddr| ifaddr.address)
        .find_map(|addr| addr.as_sockaddr_in().map(|sin| *SocketAddrV4::from(*sin).ip()))
        .ok_or_else(|| Error::config(format!("interface {} has no IPv4 address", name)))
}

#[cfg(not(unix))]
pub fn discover_interface_ip(name: &str) -> Result<Ipv4Addr> {
    Err(Error::config(format!(
        "interface lookup for {} is not supported on this platform",
        name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral() {
        let socket = bind_udp(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = local_v4(&socket).unwrap();
        assert_eq!(*addr.ip(), Ipv4Addr::LOCALHOST);
        assert_ne!(addr.port(), 0);

        // non-blocking: nothing queued
        let mut buf = [0u8; 8];
        let err = socket.recv_from(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_bind_conflict_is_socket_error() {
        let first = bind_udp(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        let taken = local_v4(&first).unwrap();
        assert!(matches!(bind_udp(taken), Err(Error::Socket { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_unknown_interface() {
        assert!(discover_interface_ip("faxgw-no-such-if0").is_err());
    }
}
