//! The parts of [Internet Protocol version
//! 4](https://datatracker.ietf.org/doc/html/rfc791) a router needs: header
//! parsing and building, checksum validation, forwarding rewrites and
//! subnetting.

mod ipv4_address;
pub use ipv4_address::Ipv4Address;

pub mod forwarding;
pub mod ipv4_parsing;
pub mod subnetting;

/// The IP protocol number of UDP.
pub const PROTOCOL_UDP: u8 = 17;
