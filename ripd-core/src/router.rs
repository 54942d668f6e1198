//! The control loop of the router.

use std::time::Duration;

use thiserror::Error as ThisError;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{
    hal::{format_mac, Frame, Hal, HalError, Mac, PciSlot, Received, RIP_MULTICAST_MAC},
    ip_table::{RoutingTable, TableError},
    protocols::{
        ipv4::{
            forwarding::{forward_rewrite, validate_header, ForwardError},
            ipv4_parsing::{self, Ipv4Header},
            Ipv4Address, PROTOCOL_UDP,
        },
        rip::{
            rip_parsing::{self, DatagramError},
            Command, RipPacket, RipRouter, RIP_PORT,
        },
        udp::{self, UdpHeader},
    },
    shutdown::{ExitStatus, Shutdown},
};

/// How often the whole table is advertised unless told otherwise.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(5000);

/// The longest the loop waits on the links before checking its timers again.
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// A RIP router running on top of a [`Hal`].
///
/// Every interface gets a route to its own network when the router is
/// created. While [`Router::run`] is going the router:
/// - advertises its table on every interface each update interval
/// - answers Requests and learns from Responses sent by neighbors
/// - forwards every other packet toward its destination
pub struct Router<H: Hal> {
    hal: H,
    rip: RipRouter,
    update_interval: Duration,
}

impl<H: Hal> Router<H> {
    /// Creates a router whose table holds up to `capacity` routes, starting
    /// with one direct route per interface.
    pub fn new(hal: H, capacity: usize) -> Result<Self, TableError> {
        let mut rip = RipRouter::new(RoutingTable::with_capacity(capacity));
        for slot in 0..hal.interface_count() as PciSlot {
            if let Some(interface) = hal.interface(slot) {
                let net = interface.network();
                rip.add_direct_route(net, slot)?;
                tracing::info!("Interface {} has address {} on {}", slot, interface.address, net);
            }
        }
        Ok(Self {
            hal,
            rip,
            update_interval: DEFAULT_UPDATE_INTERVAL,
        })
    }

    pub fn with_update_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    pub fn rip(&self) -> &RipRouter {
        &self.rip
    }

    /// Runs the router until `shutdown` fires or the links close.
    ///
    /// Problems with individual packets are logged and the packets dropped.
    /// Only a failing link ends the loop with an error.
    pub async fn run(&mut self, mut shutdown: Shutdown) -> Result<ExitStatus, HalError> {
        // Ask the neighbors for their tables instead of waiting a period
        let request = RipPacket::new_full_table_request();
        for slot in 0..self.hal.interface_count() as PciSlot {
            let result = self
                .send_rip(slot, &request, Ipv4Address::RIP_MULTICAST, RIP_MULTICAST_MAC)
                .await;
            absorb(result, slot)?;
        }

        let mut updates = time::interval_at(
            Instant::now() + self.update_interval,
            self.update_interval,
        );
        updates.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                status = shutdown.wait_for_shutdown() => {
                    tracing::info!("Shutting down: {:?}", status);
                    return Ok(status);
                }
                _ = updates.tick() => self.send_updates().await?,
                received = self.hal.receive(RECEIVE_TIMEOUT) => match received? {
                    Received::Frame(frame) => {
                        let slot = frame.slot;
                        let result = self.handle_frame(frame).await;
                        absorb(result, slot)?;
                    }
                    Received::Timeout => {}
                    Received::EndOfStream => {
                        tracing::info!("The links closed");
                        return Ok(ExitStatus::EndOfStream);
                    }
                },
            }
        }
    }

    /// Advertises the table on every interface.
    pub async fn send_updates(&mut self) -> Result<(), HalError> {
        for slot in 0..self.hal.interface_count() as PciSlot {
            for packet in self.rip.advertisement_for(slot) {
                let result = self
                    .send_rip(slot, &packet, Ipv4Address::RIP_MULTICAST, RIP_MULTICAST_MAC)
                    .await;
                absorb(result, slot)?;
            }
        }
        tracing::info!(
            "Sent periodic update with {} routes\n{}",
            self.rip.table().len(),
            self.rip.table()
        );
        Ok(())
    }

    /// Takes a frame from one of the links: answers it, learns from it or
    /// forwards it.
    pub async fn handle_frame(&mut self, mut frame: Frame) -> Result<(), PacketError> {
        tracing::trace!(
            "Frame of {} bytes on interface {} from {}",
            frame.bytes.len(),
            frame.slot,
            format_mac(frame.source)
        );
        if !validate_header(&mut frame.bytes) {
            Err(PacketError::ChecksumMismatch)?
        }
        let header = Ipv4Header::from_bytes(frame.bytes.iter().cloned())?;

        if self.is_local(header.destination) {
            self.handle_local(frame, header).await
        } else {
            self.forward(frame, header).await
        }
    }

    fn is_local(&self, destination: Ipv4Address) -> bool {
        destination == Ipv4Address::RIP_MULTICAST
            || (0..self.hal.interface_count() as PciSlot)
                .any(|slot| self.hal.interface_address(slot) == Some(destination))
    }

    async fn handle_local(&mut self, frame: Frame, header: Ipv4Header) -> Result<(), PacketError> {
        if header.protocol != PROTOCOL_UDP {
            Err(PacketError::NotRip)?
        }
        let udp_header = UdpHeader::from_bytes(frame.bytes[header.header_octets()..].iter().cloned())?;
        if udp_header.destination != RIP_PORT {
            Err(PacketError::NotRip)?
        }

        let packet = RipPacket::disassemble(&frame.bytes)?;
        match packet.command {
            Command::Request => {
                tracing::debug!("Request from {} on interface {}", header.source, frame.slot);
                for response in self.rip.process_request(frame.slot) {
                    self.send_rip(frame.slot, &response, header.source, frame.source)
                        .await?;
                }
            }
            Command::Response => {
                self.rip
                    .process_response(header.source, frame.slot, &packet);
            }
        }
        Ok(())
    }

    async fn forward(&mut self, frame: Frame, header: Ipv4Header) -> Result<(), PacketError> {
        let route = *self
            .rip
            .table()
            .lookup(header.destination)
            .ok_or(PacketError::NoRoute(header.destination))?;
        let next_hop = route.next_hop.unwrap_or(header.destination);
        let mac = self
            .hal
            .resolve(route.slot, next_hop)
            .await
            .ok_or(PacketError::AddressResolution(next_hop))?;

        let mut packet = frame.bytes;
        if forward_rewrite(&mut packet)? == 0 {
            Err(ForwardError::TtlExpired)?
        }
        self.hal.send(route.slot, &packet, mac).await?;
        Ok(())
    }

    async fn send_rip(
        &mut self,
        slot: PciSlot,
        packet: &RipPacket,
        destination: Ipv4Address,
        mac: Mac,
    ) -> Result<(), PacketError> {
        let source = self
            .hal
            .interface_address(slot)
            .ok_or(HalError::NoSuchInterface(slot))?;
        let datagram = packet.to_datagram(source, destination)?;
        self.hal.send(slot, &datagram, mac).await?;
        Ok(())
    }
}

/// Logs and swallows every error but a failing link.
fn absorb(result: Result<(), PacketError>, slot: PciSlot) -> Result<(), HalError> {
    match result {
        Ok(()) => Ok(()),
        Err(PacketError::Hal(e)) => Err(e),
        Err(e) => {
            tracing::debug!("Dropped packet on interface {}: {}", slot, e);
            Ok(())
        }
    }
}

/// Why a packet was dropped.
#[derive(Debug, ThisError)]
pub enum PacketError {
    #[error("The IPv4 header checksum is wrong")]
    ChecksumMismatch,
    #[error("Bad IPv4 header: {0}")]
    Header(#[from] ipv4_parsing::ParseError),
    #[error("Bad UDP header: {0}")]
    Udp(#[from] udp::ParseError),
    #[error("Malformed advertisement: {0}")]
    Advertisement(#[from] rip_parsing::ParseError),
    #[error("{0}")]
    Forward(#[from] ForwardError),
    #[error("No route to {0}")]
    NoRoute(Ipv4Address),
    #[error("Could not resolve the link address of {0}")]
    AddressResolution(Ipv4Address),
    #[error("The packet is addressed to this router but is not RIP")]
    NotRip,
    #[error("Could not build a RIP datagram: {0}")]
    Datagram(#[from] DatagramError),
    #[error("{0}")]
    Hal(#[from] HalError),
}
