//! Token-level parsers shared by the message parsers

use std::net::{Ipv4Addr, SocketAddrV4};

use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::{digit1, space1},
    combinator::{map_res, recognize},
    sequence::{preceded, separated_pair},
    IResult,
};

// Type alias for parser result
pub type ParseResult<'a, O> = IResult<&'a str, O>;

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic()
}

/// Any run of printable, non-space characters
pub fn token(input: &str) -> ParseResult<'_, &str> {
    take_while1(is_token_char)(input)
}

/// A token preceded by at least one space
pub fn spaced_token(input: &str) -> ParseResult<'_, &str> {
    preceded(space1, token)(input)
}

fn ipv4(input: &str) -> ParseResult<'_, Ipv4Addr> {
    map_res(
        recognize(take_while1(|c: char| c.is_ascii_digit() || c == '.')),
        str::parse::<Ipv4Addr>,
    )(input)
}

fn port(input: &str) -> ParseResult<'_, u16> {
    map_res(digit1, str::parse::<u16>)(input)
}

/// `<dotted-quad>:<port>`
pub fn ip_port(input: &str) -> ParseResult<'_, SocketAddrV4> {
    let (rest, (ip, port)) = separated_pair(ipv4, tag(":"), port)(input)?;
    Ok((rest, SocketAddrV4::new(ip, port)))
}
