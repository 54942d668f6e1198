use crate::protocols::utility::BytesExt;
use thiserror::Error as ThisError;

/// The number of bytes in a UDP header
pub const HEADER_OCTETS: u16 = 8;

/// Represents a UDP header, either one that was parsed or one we are going to
/// serialize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    /// The source port
    pub source: u16,
    /// The destination port
    pub destination: u16,
    /// The length of the UDP packet in bytes, including the header
    pub length: u16,
    /// The UDP checksum
    pub checksum: u16,
}

impl UdpHeader {
    /// Parses a UDP header from an iterator of bytes.
    ///
    /// The checksum is read but not verified. Routers exchanging RIP leave it
    /// zero.
    pub fn from_bytes(mut packet: impl Iterator<Item = u8>) -> Result<Self, ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;

        let source = packet.next_u16_be().ok_or(HTS)?;
        let destination = packet.next_u16_be().ok_or(HTS)?;
        let length = packet.next_u16_be().ok_or(HTS)?;
        let checksum = packet.next_u16_be().ok_or(HTS)?;

        if length < HEADER_OCTETS {
            Err(ParseError::LengthMismatch)?
        }

        Ok(Self {
            source,
            destination,
            length,
            checksum,
        })
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Too few bytes to constitute a UDP header")]
    HeaderTooShort,
    #[error("The UDP length is shorter than its own header")]
    LengthMismatch,
}

/// Creates a serialized UDP packet header with the values provided.
///
/// The checksum is left zero ("not computed"), which RFC 768 permits over
/// IPv4.
pub fn build_udp_header(
    source_port: u16,
    destination_port: u16,
    text_len: usize,
) -> Result<Vec<u8>, BuildHeaderError> {
    let length: u16 = (text_len + HEADER_OCTETS as usize)
        .try_into()
        .map_err(|_| BuildHeaderError::OverlyLongPayload)?;

    let mut out = Vec::with_capacity(HEADER_OCTETS as usize);
    out.extend_from_slice(&source_port.to_be_bytes());
    out.extend_from_slice(&destination_port.to_be_bytes());
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    Ok(out)
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum BuildHeaderError {
    #[error("The UDP payload is longer than can fit into a single packet")]
    OverlyLongPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE_PORT: u16 = 520;
    const DESTINATION_PORT: u16 = 520;

    fn etherparse_header() -> (etherparse::UdpHeader, Vec<u8>, &'static str) {
        let payload = "Hello, world!";
        let udp_header =
            etherparse::UdpHeader::without_ipv4_checksum(SOURCE_PORT, DESTINATION_PORT, payload.len())
                .unwrap();
        let serial = {
            let mut serial = vec![];
            udp_header.write(&mut serial).unwrap();
            serial
        };
        (udp_header, serial, payload)
    }

    #[test]
    fn parses_header() -> anyhow::Result<()> {
        let (expected, expected_serial, payload) = etherparse_header();
        let actual = UdpHeader::from_bytes(
            expected_serial
                .into_iter()
                .chain(payload.as_bytes().iter().cloned()),
        )?;
        assert_eq!(actual.source, expected.source_port);
        assert_eq!(actual.destination, expected.destination_port);
        assert_eq!(actual.length, expected.length);
        assert_eq!(actual.checksum, 0);
        Ok(())
    }

    #[test]
    fn generates_header() -> anyhow::Result<()> {
        let (_, expected, payload) = etherparse_header();
        let actual = build_udp_header(SOURCE_PORT, DESTINATION_PORT, payload.len())?;
        assert_eq!(actual, expected);
        Ok(())
    }

    #[test]
    fn rejects_short_headers() {
        assert_eq!(
            UdpHeader::from_bytes([2, 8, 2, 8, 0].into_iter()),
            Err(ParseError::HeaderTooShort)
        );
        assert_eq!(
            UdpHeader::from_bytes([2, 8, 2, 8, 0, 4, 0, 0].into_iter()),
            Err(ParseError::LengthMismatch)
        );
        assert_eq!(
            build_udp_header(520, 520, usize::from(u16::MAX)),
            Err(BuildHeaderError::OverlyLongPayload)
        );
    }
}
