use super::Ipv4Address;
use crate::protocols::utility::{BytesExt, Checksum};
use thiserror::Error as ThisError;

/// The number of `u32` words in a basic IPv4 header
const BASE_WORDS: u8 = 5;
/// The number of `u8` bytes in a basic IPv4 header
pub const BASE_OCTETS: u16 = BASE_WORDS as u16 * 4;

/// Offset of the time to live byte
pub const TTL_OFFSET: usize = 8;
/// Offset of the two checksum bytes
pub const CHECKSUM_OFFSET: usize = 10;

/// The fields of an IPv4 header (RFC791 p11 s3.1) that routing looks at.
///
/// Parsing does not check the header checksum. That is the job of
/// [`validate_header`](super::forwarding::validate_header), which works on
/// the raw bytes so it can also cover header options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Header {
    /// Internet Header Length, the number of `u32` words in the IPv4 header
    pub ihl: u8,
    /// The length of the datagram in bytes
    pub total_length: u16,
    /// The number of remaining hops this datagram can take before being removed
    pub time_to_live: u8,
    /// Indicates the next level protocol in the data portion of the datagram
    pub protocol: u8,
    /// The IPv4 header checksum
    pub checksum: u16,
    /// The source address
    pub source: Ipv4Address,
    /// The destination address
    pub destination: Ipv4Address,
}

impl Ipv4Header {
    /// Parses a header from a byte iterator. Options, if any, are left
    /// unread.
    pub fn from_bytes(mut bytes: impl Iterator<Item = u8>) -> Result<Self, ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;

        let version_and_ihl = bytes.next_u8().ok_or(HTS)?;
        let version = version_and_ihl >> 4;
        if version != 4 {
            Err(ParseError::IncorrectIpv4Version)?
        }
        let ihl = version_and_ihl & 0b1111;
        if ihl < BASE_WORDS {
            Err(ParseError::InvalidHeaderLength(ihl))?
        }
        let _type_of_service = bytes.next_u8().ok_or(HTS)?;
        let total_length = bytes.next_u16_be().ok_or(HTS)?;
        let _identification = bytes.next_u16_be().ok_or(HTS)?;
        let _flags_and_fragment_offset = bytes.next_u16_be().ok_or(HTS)?;
        let time_to_live = bytes.next_u8().ok_or(HTS)?;
        let protocol = bytes.next_u8().ok_or(HTS)?;
        let checksum = bytes.next_u16_be().ok_or(HTS)?;
        let source = bytes.next_ipv4addr().ok_or(HTS)?;
        let destination = bytes.next_ipv4addr().ok_or(HTS)?;

        Ok(Self {
            ihl,
            total_length,
            time_to_live,
            protocol,
            checksum,
            source,
            destination,
        })
    }

    /// The length of the header in bytes, options included.
    pub fn header_octets(&self) -> usize {
        self.ihl as usize * 4
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("The IPv4 header is incomplete")]
    HeaderTooShort,
    #[error("Expected version 4 in IPv4 header")]
    IncorrectIpv4Version,
    #[error("An IPv4 header cannot be {0} words long")]
    InvalidHeaderLength(u8),
}

/// A builder for IPv4 headers without options. The fields align with those
/// found on [`Ipv4Header`].
pub struct Ipv4HeaderBuilder {
    payload_length: u16,
    protocol: u8,
    source: Ipv4Address,
    destination: Ipv4Address,
}

impl Ipv4HeaderBuilder {
    /// Creates a new builder. Datagrams it describes have a time to live of
    /// one, so they never leave the local link.
    pub fn new(
        source: Ipv4Address,
        destination: Ipv4Address,
        protocol: u8,
        payload_length: u16,
    ) -> Self {
        Self {
            payload_length,
            protocol,
            source,
            destination,
        }
    }

    /// Creates a serialized header from the configuration provided
    pub fn build(self) -> Result<Vec<u8>, HeaderBuildError> {
        let mut checksum = Checksum::new();

        let version_and_ihl = (4u8 << 4) | BASE_WORDS;
        let type_of_service = 0;
        checksum.add_u8(version_and_ihl, type_of_service);

        let total_length = self
            .payload_length
            .checked_add(BASE_OCTETS)
            .ok_or(HeaderBuildError::OverlyLongPayload)?;
        checksum.add_u16(total_length);

        // Identification, flags and fragment offset are all zero
        let identification = 0u16;
        let flags_and_fragment_offset = 0u16;
        checksum.add_u16(identification);
        checksum.add_u16(flags_and_fragment_offset);

        let time_to_live = 1;
        checksum.add_u8(time_to_live, self.protocol);
        checksum.add_u32(self.source.into());
        checksum.add_u32(self.destination.into());

        let mut out = Vec::with_capacity(BASE_OCTETS as usize);
        out.push(version_and_ihl);
        out.push(type_of_service);
        out.extend_from_slice(&total_length.to_be_bytes());
        out.extend_from_slice(&identification.to_be_bytes());
        out.extend_from_slice(&flags_and_fragment_offset.to_be_bytes());
        out.push(time_to_live);
        out.push(self.protocol);
        out.extend_from_slice(&checksum.as_u16().to_be_bytes());
        out.extend_from_slice(&self.source.to_bytes());
        out.extend_from_slice(&self.destination.to_bytes());
        Ok(out)
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum HeaderBuildError {
    #[error("The payload is longer than is allowed")]
    OverlyLongPayload,
}
