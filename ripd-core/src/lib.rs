//! The core of a small IPv4 router that speaks RIP version 2.
//!
//! The router learns and advertises reachability with a distance-vector
//! protocol and forwards unicast traffic between a fixed set of interfaces.
//!
//! # Organization
//! - [`RoutingTable`] holds the known routes and answers longest-prefix-match
//!   queries
//! - [`protocols::ipv4::forwarding`] validates IPv4 header checksums and
//!   rewrites headers for forwarding
//! - [`protocols::rip`] converts between RIP wire bytes and
//!   [`RipPacket`](protocols::rip::RipPacket)s, and reconciles received
//!   advertisements against the table
//! - [`Router`] is the control loop that ties the pieces to a [`Hal`]
//!
//! # Concurrency
//!
//! A single task owns the [`Router`], and therefore the routing table. It
//! handles one received frame or one timer tick at a time, so the table needs
//! no locking. A [`Hal`] may poll its links from other tasks, but it must
//! only hand raw frames to the router through [`Hal::receive`].

pub mod hal;
pub use hal::Hal;

pub mod ip_table;
pub use ip_table::{Route, RoutingTable};

pub mod protocols;

pub mod router;
pub use router::Router;

pub mod shutdown;
pub use shutdown::Shutdown;
