//! A [`Hal`] that tunnels each interface over a UDP socket.
//!
//! Every interface is a point-to-point cable between a local socket and a
//! peer socket. A frame on the cable is the destination link address, the
//! source link address (six bytes each) and then the IPv4 packet.

use std::{collections::HashMap, io, net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use ripd_core::{
    hal::{format_mac, Frame, Hal, HalError, Interface, Mac, PciSlot, Received, RIP_MULTICAST_MAC},
    protocols::ipv4::Ipv4Address,
};
use tokio::{
    net::UdpSocket,
    sync::mpsc,
    task::JoinHandle,
};

use crate::config::InterfaceConfig;

/// Bytes of link addressing in front of every packet
pub const FRAME_HEADER_OCTETS: usize = 12;

const BROADCAST_MAC: Mac = 0xffff_ffff_ffff;

/// Larger than any frame a peer can send us
const MAX_DATAGRAM: usize = 65_536;

/// How many received frames may wait for the router before readers block.
const CHANNEL_DEPTH: usize = 1024;

/// Puts link addresses in front of `packet`.
pub fn encode_frame(destination: Mac, source: Mac, packet: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_OCTETS + packet.len());
    out.extend_from_slice(&destination.to_be_bytes()[2..]);
    out.extend_from_slice(&source.to_be_bytes()[2..]);
    out.extend_from_slice(packet);
    out
}

/// Splits a frame into its destination, source and packet.
pub fn decode_frame(frame: &[u8]) -> Option<(Mac, Mac, &[u8])> {
    if frame.len() < FRAME_HEADER_OCTETS {
        return None;
    }
    let mac = |bytes: &[u8]| bytes.iter().fold(0, |mac, byte| (mac << 8) | *byte as Mac);
    Some((mac(&frame[..6]), mac(&frame[6..12]), &frame[12..]))
}

/// One end of a cable.
pub struct UdpLink {
    pub interface: Interface,
    pub mac: Mac,
    pub socket: UdpSocket,
    pub peer: SocketAddr,
    pub neighbors: HashMap<Ipv4Address, Mac>,
}

impl UdpLink {
    /// Binds the local socket described by `config`.
    pub async fn bind(config: &InterfaceConfig) -> Result<Self, HalError> {
        let socket = UdpSocket::bind(config.bind).await?;
        Ok(Self {
            interface: config.interface(),
            mac: config.mac,
            socket,
            peer: config.peer,
            neighbors: config
                .neighbors
                .iter()
                .map(|neighbor| (neighbor.address.into(), neighbor.mac))
                .collect(),
        })
    }
}

struct Port {
    interface: Interface,
    mac: Mac,
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    neighbors: HashMap<Ipv4Address, Mac>,
}

pub struct UdpHal {
    ports: Vec<Port>,
    frames: mpsc::Receiver<Frame>,
    readers: Vec<JoinHandle<()>>,
}

impl UdpHal {
    /// Binds a socket per interface, in slot order.
    pub async fn bind(configs: &[InterfaceConfig]) -> Result<Self, HalError> {
        let mut links = Vec::with_capacity(configs.len());
        for config in configs {
            links.push(UdpLink::bind(config).await?);
        }
        Ok(Self::new(links))
    }

    /// Starts reading from every link. Must be called inside a tokio runtime.
    pub fn new(links: Vec<UdpLink>) -> Self {
        let (send, frames) = mpsc::channel(CHANNEL_DEPTH);
        let mut ports = Vec::with_capacity(links.len());
        let mut readers = Vec::with_capacity(links.len());
        for (slot, link) in links.into_iter().enumerate() {
            let socket = Arc::new(link.socket);
            readers.push(tokio::spawn(read_link(
                slot as PciSlot,
                link.mac,
                socket.clone(),
                send.clone(),
            )));
            ports.push(Port {
                interface: link.interface,
                mac: link.mac,
                socket,
                peer: link.peer,
                neighbors: link.neighbors,
            });
        }
        Self {
            ports,
            frames,
            readers,
        }
    }

    fn port(&self, slot: PciSlot) -> Result<&Port, HalError> {
        self.ports
            .get(slot as usize)
            .ok_or(HalError::NoSuchInterface(slot))
    }
}

impl Drop for UdpHal {
    fn drop(&mut self) {
        for reader in self.readers.iter() {
            reader.abort();
        }
    }
}

/// Whether a failed receive leaves the socket usable. A peer that is not
/// up yet shows up as a refused or reset connection on some platforms.
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Hands every frame addressed to us on `slot` to the router until the
/// router goes away or the socket fails for good.
async fn read_link(slot: PciSlot, mac: Mac, socket: Arc<UdpSocket>, frames: mpsc::Sender<Frame>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let len = match socket.recv_from(&mut buf).await {
            Ok((len, _)) => len,
            Err(e) if is_transient(&e) => {
                tracing::debug!("Receive on interface {} failed, retrying: {}", slot, e);
                continue;
            }
            Err(e) => {
                tracing::error!("Stopped receiving on interface {}: {}", slot, e);
                break;
            }
        };
        let Some((destination, source, packet)) = decode_frame(&buf[..len]) else {
            tracing::debug!("Runt frame of {} bytes on interface {}", len, slot);
            continue;
        };
        if destination != mac && destination != RIP_MULTICAST_MAC && destination != BROADCAST_MAC {
            tracing::trace!(
                "Frame for {} is not ours on interface {}",
                format_mac(destination),
                slot
            );
            continue;
        }
        let frame = Frame {
            bytes: packet.to_vec(),
            source,
            destination,
            slot,
        };
        if frames.send(frame).await.is_err() {
            break;
        }
    }
}

#[async_trait]
impl Hal for UdpHal {
    fn interface_count(&self) -> usize {
        self.ports.len()
    }

    fn interface(&self, slot: PciSlot) -> Option<Interface> {
        self.ports.get(slot as usize).map(|port| port.interface)
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Received, HalError> {
        Ok(match tokio::time::timeout(timeout, self.frames.recv()).await {
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
        let port = self.port(slot)?;
        let frame = encode_frame(destination, port.mac, packet);
        port.socket.send_to(&frame, port.peer).await?;
        Ok(())
    }

    async fn resolve(&mut self, slot: PciSlot, address: Ipv4Address) -> Option<Mac> {
        self.ports.get(slot as usize)?.neighbors.get(&address).copied()
    }
}
