//! A [`Hal`] whose interfaces are in-process channels. Lets a test play every
//! neighbor of a router at once.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{Frame, Hal, HalError, Interface, Mac, PciSlot, Received};
use crate::protocols::ipv4::Ipv4Address;

/// The link address of our own interface in `slot`.
pub fn local_mac(slot: PciSlot) -> Mac {
    0x02_00_00_00_00_00 | slot as Mac
}

pub struct MemoryHal {
    interfaces: Vec<Interface>,
    neighbors: HashMap<(PciSlot, Ipv4Address), Mac>,
    inbound: UnboundedReceiver<Frame>,
    outbound: UnboundedSender<Frame>,
}

/// The far end of every interface of a [`MemoryHal`].
pub struct MemoryLink {
    inbound: UnboundedSender<Frame>,
    outbound: UnboundedReceiver<Frame>,
}

impl MemoryHal {
    pub fn new(interfaces: Vec<Interface>) -> (Self, MemoryLink) {
        let (inbound_send, inbound_recv) = mpsc::unbounded_channel();
        let (outbound_send, outbound_recv) = mpsc::unbounded_channel();
        let hal = Self {
            interfaces,
            neighbors: Default::default(),
            inbound: inbound_recv,
            outbound: outbound_send,
        };
        let link = MemoryLink {
            inbound: inbound_send,
            outbound: outbound_recv,
        };
        (hal, link)
    }

    /// Makes `address` resolvable to `mac` on `slot`.
    pub fn add_neighbor(&mut self, slot: PciSlot, address: Ipv4Address, mac: Mac) {
        self.neighbors.insert((slot, address), mac);
    }
}

#[async_trait]
impl Hal for MemoryHal {
    fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    fn interface(&self, slot: PciSlot) -> Option<Interface> {
        self.interfaces.get(slot as usize).copied()
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Received, HalError> {
        Ok(match tokio::time::timeout(timeout, self.inbound.recv()).await {
            Ok(Some(frame)) => Received::Frame(frame),
            Ok(None) => Received::EndOfStream,
            Err(_) => Received::Timeout,
        })
    }

    async fn send(
        &mut self,
        slot: PciSlot,
        packet: &[u8],
        destination: Mac,
    ) -> Result<(), HalError> {
        if slot as usize >= self.interfaces.len() {
            Err(HalError::NoSuchInterface(slot))?
        }
        let frame = Frame {
            bytes: packet.to_vec(),
            source: local_mac(slot),
            destination,
            slot,
        };
        self.outbound.send(frame).ok();
        Ok(())
    }

    async fn resolve(&mut self, slot: PciSlot, address: Ipv4Address) -> Option<Mac> {
        self.neighbors.get(&(slot, address)).copied()
    }
}

impl MemoryLink {
    /// Delivers a frame to the router as if it arrived on `frame.slot`.
    pub fn deliver(&self, frame: Frame) {
        self.inbound.send(frame).ok();
    }

    /// Waits for the next frame the router sends.
    pub async fn sent(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// The next frame the router already sent, if any.
    pub fn try_sent(&mut self) -> Option<Frame> {
        self.outbound.try_recv().ok()
    }
}
