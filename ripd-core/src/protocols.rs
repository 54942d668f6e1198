//! Parsing and building of the protocols a RIP router deals with.

pub mod ipv4;
pub mod rip;
pub mod udp;
pub mod utility;
