//! Header checksum validation and the TTL rewrite done when forwarding.
//!
//! Both functions work in place on the raw packet bytes. The header length is
//! taken from the low nibble of the first byte, so options are covered by the
//! checksum as well.

use super::ipv4_parsing::{BASE_OCTETS, CHECKSUM_OFFSET, TTL_OFFSET};
use crate::protocols::utility::Checksum;
use thiserror::Error as ThisError;

/// The length in bytes of the header at the start of `packet`, if the packet
/// is long enough to hold it.
fn header_octets(packet: &[u8]) -> Option<usize> {
    let octets = (*packet.first()? & 0x0f) as usize * 4;
    if octets < BASE_OCTETS as usize || packet.len() < octets {
        return None;
    }
    Some(octets)
}

/// Reads the stored checksum and zeroes it, returning the stored value and
/// the unfolded sum of the header.
fn sum_header(packet: &mut [u8], octets: usize) -> (u16, Checksum) {
    let expected = u16::from_be_bytes([packet[CHECKSUM_OFFSET], packet[CHECKSUM_OFFSET + 1]]);
    packet[CHECKSUM_OFFSET] = 0;
    packet[CHECKSUM_OFFSET + 1] = 0;

    let mut checksum = Checksum::new();
    for word in packet[..octets].chunks_exact(2) {
        checksum.add_u8(word[0], word[1]);
    }
    (expected, checksum)
}

fn write_checksum(packet: &mut [u8], value: u16) {
    packet[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&value.to_be_bytes());
}

/// Checks the IPv4 header checksum of `packet`.
///
/// The checksum bytes are always overwritten with the recomputed checksum, so
/// copy the packet first if the original bytes matter after a failed
/// validation. A packet too short for the header it declares is invalid and
/// left untouched.
pub fn validate_header(packet: &mut [u8]) -> bool {
    let Some(octets) = header_octets(packet) else {
        return false;
    };
    let (expected, checksum) = sum_header(packet, octets);
    let actual = checksum.as_u16();
    write_checksum(packet, actual);
    actual == expected
}

/// Prepares a packet to be sent on to its next hop: validates the header,
/// decrements the time to live and patches the checksum incrementally.
///
/// Returns the new time to live. The caller must not forward a packet whose
/// time to live reached zero. On error the packet is left exactly as it was.
pub fn forward_rewrite(packet: &mut [u8]) -> Result<u8, ForwardError> {
    let octets = header_octets(packet).ok_or(ForwardError::HeaderTooShort)?;
    let (expected, mut checksum) = sum_header(packet, octets);
    let actual = checksum.as_u16();
    if actual != expected {
        write_checksum(packet, expected);
        return Err(ForwardError::ChecksumMismatch { expected, actual });
    }

    let time_to_live = packet[TTL_OFFSET];
    if time_to_live == 0 {
        write_checksum(packet, expected);
        return Err(ForwardError::TtlExpired);
    }
    packet[TTL_OFFSET] = time_to_live - 1;

    // TTL is the high byte of its word
    checksum.sub_u16(0x0100);
    write_checksum(packet, checksum.as_u16());
    Ok(time_to_live - 1)
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ForwardError {
    #[error("The packet is shorter than its IPv4 header")]
    HeaderTooShort,
    #[error(
        "The header checksum {expected:#06x} does not match the calculated checksum {actual:#06x}"
    )]
    ChecksumMismatch { expected: u16, actual: u16 },
    #[error("The time to live is already zero")]
    TtlExpired,
}
