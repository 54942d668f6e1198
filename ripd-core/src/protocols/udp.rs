//! The [User Datagram Protocol](https://www.ietf.org/rfc/rfc768.txt) header
//! RIP messages travel in.

mod udp_parsing;
pub use udp_parsing::{build_udp_header, BuildHeaderError, ParseError, UdpHeader, HEADER_OCTETS};
