//! Contains utilities for implementing protocols.

use super::ipv4::Ipv4Address;

/// A calculator for the checksum used by the IP and UDP protocols.
///
/// The running sum is kept unfolded so that a header can be patched
/// incrementally with [`Checksum::sub_u16`] before the final value is taken.
/// It is meant for headers, which are far too short to overflow a `u32`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(u32);

impl Checksum {
    /// Creates a new checksum calculator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `u16` to the checksum value.
    pub fn add_u16(&mut self, value: u16) {
        self.0 += u32::from(value);
    }

    /// Removes a `u16` that was previously added to the checksum value.
    pub fn sub_u16(&mut self, value: u16) {
        self.0 = self.0.saturating_sub(u32::from(value));
    }

    /// Adds `u16` formed by two `u8`s to the checksum value.
    pub fn add_u8(&mut self, a: u8, b: u8) {
        self.add_u16(u16::from_be_bytes([a, b]));
    }

    /// Adds two `u16`s to the checksum value by splitting a `u32` in half.
    pub fn add_u32(&mut self, value: [u8; 4]) {
        self.add_u8(value[0], value[1]);
        self.add_u8(value[2], value[3]);
    }

    /// The ones' complement sum, with every carry added back in.
    pub fn folded(&self) -> u16 {
        let mut sum = self.0;
        while sum >> 16 != 0 {
            sum = (sum >> 16) + (sum & 0xffff);
        }
        sum as u16
    }

    /// Computes the final checksum value.
    pub fn as_u16(&self) -> u16 {
        !self.folded()
    }
}

/// An extension trait for Iterator<Item = u8>. This should make it easier to parse bytes.
/// This adds methods for reading numbers from the iterator, such as u32s.
///
/// # Example
///
/// ```
/// # use ripd_core::protocols::utility::BytesExt;
/// let arr = [0xFF, 0x01, 0x09, 0x69];
/// let mut iter = arr.iter().cloned();
/// assert_eq!(iter.next_u16_be(), Some(0xFF01));
/// assert_eq!(iter.next_u8(), Some(0x09));
/// assert_eq!(iter.next_u32_be(), None);
/// ```
pub trait BytesExt: Iterator<Item = u8> {
    /// Advances the iterator and returns the next value.
    /// Functions identically to `Iterator<Item = u8>::next`.
    fn next_u8(&mut self) -> Option<u8> {
        self.next()
    }

    /// Advances the iterator by 2 bytes.
    /// Combines these 2 bytes in big-endian order into a u16.
    /// Returns None if there were fewer than 2 bytes left in the iterator.
    fn next_u16_be(&mut self) -> Option<u16> {
        let arr = [self.next()?, self.next()?];
        Some(u16::from_be_bytes(arr))
    }

    /// Advances the iterator by 4 bytes.
    /// Combines these 4 bytes in big-endian order into a u32.
    /// Returns None if there were fewer than 4 bytes left in the iterator.
    fn next_u32_be(&mut self) -> Option<u32> {
        let arr = [self.next()?, self.next()?, self.next()?, self.next()?];
        Some(u32::from_be_bytes(arr))
    }

    /// Advances the iterator by 4 bytes.
    /// Combines these bytes in big-endian order into an [`Ipv4Address`].
    /// Returns None if there were fewer than 4 bytes left in the iterator.
    fn next_ipv4addr(&mut self) -> Option<Ipv4Address> {
        self.next_u32_be().map(Ipv4Address::from)
    }
}

impl<T: Iterator<Item = u8>> BytesExt for T {}
