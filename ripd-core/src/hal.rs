//! The link layer the router runs on top of.
//!
//! A [`Hal`] owns a fixed set of interfaces, each identified by its
//! [`PciSlot`]. It hands the router whole frames, sends frames the router
//! builds, and knows the link address of the neighbors on each interface.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error as ThisError;

use crate::protocols::ipv4::{
    subnetting::{Ipv4Mask, Ipv4Net},
    Ipv4Address,
};

pub mod memory;
pub use memory::{MemoryHal, MemoryLink};

/// The index of an interface
pub type PciSlot = u32;

/// A 48-bit link address, kept in the low bits
pub type Mac = u64;

/// The link address the RIP multicast group `224.0.0.9` maps to.
pub const RIP_MULTICAST_MAC: Mac = 0x01_00_5e_00_00_09;

/// Formats a link address as `01:00:5e:00:00:09`.
pub fn format_mac(mac: Mac) -> String {
    let bytes = mac.to_be_bytes();
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]
    )
}

/// The IPv4 configuration of one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interface {
    /// Our address on the attached network
    pub address: Ipv4Address,
    pub mask: Ipv4Mask,
}

impl Interface {
    pub fn new(address: Ipv4Address, prefix_len: u32) -> Self {
        Self {
            address,
            mask: Ipv4Mask::from_bitcount(prefix_len),
        }
    }

    /// The network this interface is attached to.
    pub fn network(&self) -> Ipv4Net {
        Ipv4Net::new(self.address, self.mask)
    }
}

/// A frame taken off one of the interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The IPv4 packet the frame carries
    pub bytes: Vec<u8>,
    pub source: Mac,
    pub destination: Mac,
    /// The interface the frame arrived on
    pub slot: PciSlot,
}

/// The outcome of waiting for a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Frame(Frame),
    /// Nothing arrived before the timeout
    Timeout,
    /// No frame will ever arrive again
    EndOfStream,
}

#[async_trait]
pub trait Hal: Send + 'static {
    /// How many interfaces there are. Slots run from zero to one less than
    /// this.
    fn interface_count(&self) -> usize;

    /// The configuration of the interface in `slot`.
    fn interface(&self, slot: PciSlot) -> Option<Interface>;

    /// Our IPv4 address on the interface in `slot`.
    fn interface_address(&self, slot: PciSlot) -> Option<Ipv4Address> {
        self.interface(slot).map(|interface| interface.address)
    }

    /// Waits at most `timeout` for a frame on any interface.
    async fn receive(&mut self, timeout: Duration) -> Result<Received, HalError>;

    /// Sends an IPv4 packet out of `slot` to the given link address.
    async fn send(&mut self, slot: PciSlot, packet: &[u8], destination: Mac)
        -> Result<(), HalError>;

    /// Finds the link address of the neighbor with address `address` on
    /// `slot`.
    async fn resolve(&mut self, slot: PciSlot, address: Ipv4Address) -> Option<Mac>;
}

#[derive(Debug, ThisError)]
pub enum HalError {
    #[error("There is no interface {0}")]
    NoSuchInterface(PciSlot),
    #[error("Link I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_macs() {
        assert_eq!(format_mac(RIP_MULTICAST_MAC), "01:00:5e:00:00:09");
        assert_eq!(format_mac(0xffff_ffff_ffff), "ff:ff:ff:ff:ff:ff");
    }

    #[test]
    fn interface_network() {
        let interface = Interface::new([10, 0, 3, 1].into(), 24);
        assert_eq!(interface.network(), Ipv4Net::new_short([10, 0, 3, 0], 24));
    }
}
