use super::{INFINITY, MAX_ENTRIES, RIP_PORT};
use crate::protocols::{
    ipv4::{
        ipv4_parsing::{self, HeaderBuildError, Ipv4Header, Ipv4HeaderBuilder},
        subnetting::{Ipv4Mask, Ipv4Net},
        Ipv4Address, PROTOCOL_UDP,
    },
    udp::{self, build_udp_header, BuildHeaderError, UdpHeader},
    utility::BytesExt,
};
use thiserror::Error as ThisError;

/// The RIP version we speak
const VERSION: u8 = 2;
/// Command, version and two reserved bytes
pub const HEADER_OCTETS: usize = 4;
/// The size of one route entry on the wire
pub const ENTRY_OCTETS: usize = 20;

/// Whether a message asks for routes or carries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Request = 1,
    Response = 2,
}

impl Command {
    /// The address family identifier every entry of a message with this
    /// command carries: unspecified for requests, IP for responses.
    pub const fn address_family(self) -> u16 {
        match self {
            Command::Request => 0,
            Command::Response => 2,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Command::Request),
            2 => Ok(Command::Response),
            other => Err(ParseError::InvalidCommand(other)),
        }
    }
}

/// One route in a RIP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RipEntry {
    /// The destination as it appeared on the wire. Host bits may be set.
    pub address: Ipv4Address,
    pub mask: Ipv4Mask,
    /// Where to send packets for this destination, or `0.0.0.0` for "via
    /// whoever sent this entry"
    pub next_hop: Ipv4Address,
    pub metric: u32,
}

impl RipEntry {
    pub fn new(address: Ipv4Address, mask: Ipv4Mask, next_hop: Ipv4Address, metric: u32) -> Self {
        Self {
            address,
            mask,
            next_hop,
            metric,
        }
    }

    /// The destination network, with any host bits of the address cleared.
    pub fn network(&self) -> Ipv4Net {
        Ipv4Net::new(self.address, self.mask)
    }

    /// Parses a single entry belonging to a message with the given command.
    pub fn from_bytes(
        mut bytes: impl Iterator<Item = u8>,
        command: Command,
    ) -> Result<Self, ParseError> {
        const ETS: ParseError = ParseError::EntryTooShort;

        let family = bytes.next_u16_be().ok_or(ETS)?;
        let route_tag = bytes.next_u16_be().ok_or(ETS)?;
        let address = bytes.next_ipv4addr().ok_or(ETS)?;
        let mask = bytes.next_u32_be().ok_or(ETS)?;
        let next_hop = bytes.next_ipv4addr().ok_or(ETS)?;
        let metric = bytes.next_u32_be().ok_or(ETS)?;

        if family != command.address_family() {
            Err(ParseError::FamilyMismatch {
                expected: command.address_family(),
                actual: family,
            })?
        }
        if route_tag != 0 {
            Err(ParseError::NonzeroRouteTag(route_tag))?
        }
        let mask = Ipv4Mask::try_from(mask).map_err(ParseError::NonCanonicalMask)?;
        if !(1..=INFINITY).contains(&metric) {
            Err(ParseError::MetricOutOfRange(metric))?
        }

        Ok(Self {
            address,
            mask,
            next_hop,
            metric,
        })
    }

    fn write(&self, family: u16, out: &mut Vec<u8>) {
        out.extend_from_slice(&family.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&self.address.to_bytes());
        out.extend_from_slice(&self.mask.to_u32().to_be_bytes());
        out.extend_from_slice(&self.next_hop.to_bytes());
        out.extend_from_slice(&self.metric.to_be_bytes());
    }
}

/// A RIP version 2 message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RipPacket {
    pub command: Command,
    /// At most [`MAX_ENTRIES`] entries
    pub entries: Vec<RipEntry>,
}

impl RipPacket {
    pub fn new_request(entries: Vec<RipEntry>) -> Self {
        Self {
            command: Command::Request,
            entries,
        }
    }

    pub fn new_response(entries: Vec<RipEntry>) -> Self {
        Self {
            command: Command::Response,
            entries,
        }
    }

    /// A request for every route the receiver knows: a single entry for the
    /// default network with an infinite metric.
    pub fn new_full_table_request() -> Self {
        Self::new_request(vec![RipEntry::new(
            Ipv4Address::UNSPECIFIED,
            Ipv4Mask::from_bitcount(0),
            Ipv4Address::UNSPECIFIED,
            INFINITY,
        )])
    }

    /// Serializes the message into the payload of a UDP datagram. The
    /// message should hold at most [`MAX_ENTRIES`] entries.
    pub fn assemble(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_OCTETS + ENTRY_OCTETS * self.entries.len());
        out.push(self.command as u8);
        out.push(VERSION);
        out.extend_from_slice(&[0, 0]);
        let family = self.command.address_family();
        for entry in self.entries.iter() {
            entry.write(family, &mut out);
        }
        out
    }

    /// Parses the RIP message carried by an IPv4 packet. The packet must
    /// already be known to hold a UDP datagram; the UDP ports are not
    /// checked here.
    ///
    /// Only bytes within the IPv4 total length are read. Trailing bytes past
    /// it are ignored.
    pub fn disassemble(packet: &[u8]) -> Result<Self, ParseError> {
        let ip_header = Ipv4Header::from_bytes(packet.iter().cloned())?;
        let declared = ip_header.total_length as usize;
        if declared > packet.len() {
            Err(ParseError::TruncatedPacket {
                declared,
                actual: packet.len(),
            })?
        }

        let udp_start = ip_header.header_octets();
        let message_start = udp_start + udp::HEADER_OCTETS as usize;
        if declared < message_start + HEADER_OCTETS {
            Err(ParseError::HeaderTooShort)?
        }
        UdpHeader::from_bytes(packet[udp_start..message_start].iter().cloned())?;

        Self::from_bytes(&packet[message_start..declared])
    }

    /// Parses a RIP message that has already been taken out of its UDP
    /// datagram.
    pub fn from_bytes(message: &[u8]) -> Result<Self, ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;

        let mut header = message.iter().cloned();
        let command = Command::try_from(header.next_u8().ok_or(HTS)?)?;
        let version = header.next_u8().ok_or(HTS)?;
        if version != VERSION {
            Err(ParseError::InvalidVersion(version))?
        }
        if header.next_u16_be().ok_or(HTS)? != 0 {
            Err(ParseError::NonzeroReserved)?
        }

        let body = &message[HEADER_OCTETS..];
        if body.len() % ENTRY_OCTETS != 0 {
            Err(ParseError::PartialEntry)?
        }
        let count = body.len() / ENTRY_OCTETS;
        if count > MAX_ENTRIES {
            Err(ParseError::TooManyEntries(count))?
        }

        let entries = body
            .chunks_exact(ENTRY_OCTETS)
            .map(|chunk| RipEntry::from_bytes(chunk.iter().cloned(), command))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { command, entries })
    }

    /// Wraps the message in the UDP and IPv4 headers RIP datagrams are sent
    /// with: port 520 on both ends and a time to live of one.
    pub fn to_datagram(
        &self,
        source: Ipv4Address,
        destination: Ipv4Address,
    ) -> Result<Vec<u8>, DatagramError> {
        if self.entries.len() > MAX_ENTRIES {
            Err(DatagramError::TooManyEntries(self.entries.len()))?
        }
        let message = self.assemble();
        let udp_header = build_udp_header(RIP_PORT, RIP_PORT, message.len())?;
        let payload_length = (udp_header.len() + message.len())
            .try_into()
            .map_err(|_| HeaderBuildError::OverlyLongPayload)?;
        let ip_header =
            Ipv4HeaderBuilder::new(source, destination, PROTOCOL_UDP, payload_length).build()?;

        let mut datagram = ip_header;
        datagram.extend(udp_header);
        datagram.extend(message);
        Ok(datagram)
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Too few bytes to constitute a RIP message")]
    HeaderTooShort,
    #[error("The packet declares {declared} bytes but only {actual} arrived")]
    TruncatedPacket { declared: usize, actual: usize },
    #[error("{0} is not a RIP command")]
    InvalidCommand(u8),
    #[error("Expected RIP version 2, got {0}")]
    InvalidVersion(u8),
    #[error("The reserved bytes of the RIP header are not zero")]
    NonzeroReserved,
    #[error("Expected address family {expected}, got {actual}")]
    FamilyMismatch { expected: u16, actual: u16 },
    #[error("Route tag {0} is not supported")]
    NonzeroRouteTag(u16),
    #[error("{0:#010x} is not a valid subnet mask")]
    NonCanonicalMask(u32),
    #[error("Metric {0} is outside of 1 to 16")]
    MetricOutOfRange(u32),
    #[error("The message ends partway through an entry")]
    PartialEntry,
    #[error("A message cannot carry {0} entries")]
    TooManyEntries(usize),
    #[error("Too few bytes to constitute a RIP entry")]
    EntryTooShort,
    #[error("{0}")]
    Ipv4(#[from] ipv4_parsing::ParseError),
    #[error("{0}")]
    Udp(#[from] udp::ParseError),
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum DatagramError {
    #[error("A message cannot carry {0} entries")]
    TooManyEntries(usize),
    #[error("{0}")]
    Ipv4(#[from] HeaderBuildError),
    #[error("{0}")]
    Udp(#[from] BuildHeaderError),
}
