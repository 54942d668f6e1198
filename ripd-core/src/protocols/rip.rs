//! Routing Information Protocol version 2 ([RFC 2453](https://www.rfc-editor.org/rfc/rfc2453)).
//!
//! [`rip_parsing`] converts between wire bytes and [`RipPacket`]s and
//! [`rip_router`] keeps a routing table up to date from the packets that
//! neighbors send.

pub mod rip_parsing;
pub use rip_parsing::{Command, RipEntry, RipPacket};

pub mod rip_router;
pub use rip_router::{RipRouter, RouteChange};

/// The metric that means "unreachable"
pub const INFINITY: u32 = 16;

/// The most entries a single RIP message may carry
pub const MAX_ENTRIES: usize = 25;

/// The UDP port RIP is spoken on, both as source and destination
pub const RIP_PORT: u16 = 520;
