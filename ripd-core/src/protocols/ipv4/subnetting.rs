//! Subnet masks and networks for classless (CIDR) routing.
//!
//! RIP version 2 carries a subnet mask with every route while the routing
//! table is keyed by prefix length, so most of this module is about moving
//! between the two safely.
//!
//! Wikipedia article on CIDR: <https://en.wikipedia.org/wiki/Classless_Inter-Domain_Routing>

use std::{fmt, str::FromStr};

use super::Ipv4Address;

/// A struct representing an Ipv4 subnet mask.
/// (It's a thin wrapper around a u32.)
///
/// A mask is always canonical: a run of ones followed by a run of zeros.
/// Ordering follows the `u32` value, so longer prefixes sort after shorter
/// ones.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Ipv4Mask(u32);

impl fmt::Debug for Ipv4Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ipv4Mask")
            .field(&Ipv4Address::from(self.0))
            .finish()
    }
}

impl fmt::Display for Ipv4Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Ipv4Address::from(self.0), f)
    }
}

impl Ipv4Mask {
    /// Returns a mask of `size` 1s.
    /// Should be a number from 0 to 32.
    /// If `size > 32`, then it will be set to 32.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ripd_core::protocols::ipv4::subnetting::*;
    /// // 255.255.0.0
    /// let mask = Ipv4Mask::from_bitcount(16);
    /// assert_eq!(u32::from(mask), 0xFF_FF_00_00);
    /// ```
    pub const fn from_bitcount(size: u32) -> Ipv4Mask {
        let size = if size > 32 { 32 } else { size };
        if size == 0 {
            Ipv4Mask(0)
        } else {
            Ipv4Mask(u32::MAX << (32 - size))
        }
    }

    /// The prefix length, which is the number of 1s in this mask.
    pub const fn prefix_len(&self) -> u32 {
        self.0.count_ones()
    }

    /// Turns the mask into a u32.
    pub const fn to_u32(self) -> u32 {
        self.0
    }

    /// Keeps only the network part of `address`.
    pub fn apply(&self, address: Ipv4Address) -> Ipv4Address {
        Ipv4Address::from(address.to_u32() & self.0)
    }
}

impl From<Ipv4Mask> for u32 {
    fn from(mask: Ipv4Mask) -> u32 {
        mask.0
    }
}

impl From<Ipv4Mask> for Ipv4Address {
    fn from(mask: Ipv4Mask) -> Ipv4Address {
        Ipv4Address::from(mask.0)
    }
}

impl TryFrom<u32> for Ipv4Mask {
    type Error = u32;

    /// Returns an Ipv4Mask based on the u32.
    /// If the u32 is not a valid subnet mask (that is, it has 0s between the 1s),
    /// this will return the number back as an error.
    fn try_from(mask: u32) -> Result<Ipv4Mask, u32> {
        let result = Ipv4Mask::from_bitcount(mask.count_ones());
        if result.0 == mask {
            Ok(result)
        } else {
            Err(mask)
        }
    }
}

/// `Ipv4Net` is a network: an address with every host bit cleared, and the
/// mask that says which bits are significant.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ipv4Net {
    /// This MUST be a network ID or it will screw up Eq
    network_id: Ipv4Address,
    mask: Ipv4Mask,
}

impl Ipv4Net {
    /// Creates an Ipv4Net from an IP address and mask. Host bits of `ip` are
    /// cleared.
    pub fn new(ip: Ipv4Address, mask: Ipv4Mask) -> Self {
        Self {
            network_id: mask.apply(ip),
            mask,
        }
    }

    /// Creates a new Ipv4Net from something that can be converted into
    /// an IP address, and a prefix length.
    /// The prefix length is clamped to the 0-32 range.
    ///
    /// # Example
    ///
    /// ```
    /// # use ripd_core::protocols::ipv4::*;
    /// # use ripd_core::protocols::ipv4::subnetting::*;
    /// let net1 = Ipv4Net::new_short([12, 13, 12, 7], 28);
    /// let net2 = Ipv4Net::new(Ipv4Address::from([12, 13, 12, 0]), Ipv4Mask::from_bitcount(28));
    /// assert_eq!(net1, net2);
    /// ```
    pub fn new_short(ip: impl Into<Ipv4Address>, prefix_len: u32) -> Ipv4Net {
        Ipv4Net::new(ip.into(), Ipv4Mask::from_bitcount(prefix_len))
    }

    /// Turns a string in [CIDR notation](https://en.wikipedia.org/wiki/Classless_Inter-Domain_Routing#CIDR_notation)
    /// into a network.
    ///
    /// Returns an error if the string is not of form `ip_address/prefix_length`.
    ///
    /// # Example
    ///
    /// ```
    /// # use ripd_core::protocols::ipv4::subnetting::*;
    /// # use ripd_core::protocols::ipv4::*;
    /// let net = Ipv4Net::from_cidr("10.0.0.119/24").unwrap();
    /// assert_eq!(net.id(), Ipv4Address::from([10, 0, 0, 0]));
    /// assert_eq!(net.prefix_len(), 24);
    /// ```
    pub fn from_cidr(cidr: &str) -> Result<Ipv4Net, CidrParseError> {
        let (ip_str, len_str) = cidr.split_once('/').ok_or(CidrParseError::Ipv4)?;
        let ip = Ipv4Address::from_str(ip_str).or(Err(CidrParseError::Ipv4))?;
        let prefix_len = u32::from_str(len_str)?;
        if prefix_len > 32 {
            return Err(CidrParseError::PrefixTooLong(prefix_len));
        }
        Ok(Ipv4Net::new_short(ip, prefix_len))
    }

    /// Returns the first IP address in this network.
    pub fn id(&self) -> Ipv4Address {
        self.network_id
    }

    /// Returns the `Ipv4Mask` of this network.
    pub fn mask(&self) -> Ipv4Mask {
        self.mask
    }

    /// Returns the number of significant bits of the network.
    pub fn prefix_len(&self) -> u32 {
        self.mask.prefix_len()
    }

    /// Returns `true` if the `address` is contained in this network.
    pub fn contains(&self, address: Ipv4Address) -> bool {
        self.mask.apply(address) == self.network_id
    }
}

impl From<(Ipv4Address, Ipv4Mask)> for Ipv4Net {
    fn from(value: (Ipv4Address, Ipv4Mask)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl fmt::Debug for Ipv4Net {
    /// The results will be of form `Ipv4Net {10.0.0.0/8}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ipv4Net {{{}}}", self)
    }
}

impl fmt::Display for Ipv4Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network_id, self.prefix_len())
    }
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum CidrParseError {
    #[error("Failed to parse the address of a CIDR string")]
    Ipv4,
    #[error("Failed to parse the prefix length of a CIDR string: {0}")]
    Mask(#[from] std::num::ParseIntError),
    #[error("Prefix length {0} is longer than 32 bits")]
    PrefixTooLong(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_prefix_lengths() {
        for len in 0..=32 {
            let mask = Ipv4Mask::from_bitcount(len);
            assert_eq!(mask.prefix_len(), len);
            assert_eq!(Ipv4Mask::try_from(mask.to_u32()), Ok(mask));
        }
        assert_eq!(Ipv4Mask::from_bitcount(40), Ipv4Mask::from_bitcount(32));
        assert_eq!(Ipv4Mask::from_bitcount(24).to_u32(), 0xffff_ff00);
    }

    #[test]
    fn rejects_holes_in_masks() {
        let holes: u32 = 0b1010_0000 << 24;
        assert_eq!(Ipv4Mask::try_from(holes), Err(holes));
        assert_eq!(Ipv4Mask::try_from(0x0000_00ffu32), Err(0x0000_00ff));
        assert_eq!(Ipv4Mask::try_from(0xff00_ff00u32), Err(0xff00_ff00));
    }

    #[test]
    fn network_clears_host_bits() {
        let net = Ipv4Net::new_short([67, 2, 3, 4], 8);
        assert_eq!(net.id(), Ipv4Address::new([67, 0, 0, 0]));
        assert!(net.contains([67, 255, 255, 255].into()));
        assert!(net.contains([67, 2, 17, 17].into()));
        assert!(!net.contains([68, 0, 0, 0].into()));
        assert_eq!(net.to_string(), "67.0.0.0/8");

        let default = Ipv4Net::new_short([1, 2, 3, 4], 0);
        assert!(default.contains([255, 255, 255, 255].into()));
    }

    #[test]
    fn parses_cidr() {
        assert_eq!(
            Ipv4Net::from_cidr("10.0.3.7/24"),
            Ok(Ipv4Net::new_short([10, 0, 3, 0], 24))
        );
        assert_eq!(Ipv4Net::from_cidr("10.0.3.7"), Err(CidrParseError::Ipv4));
        assert_eq!(
            Ipv4Net::from_cidr("10.0.3.7/33"),
            Err(CidrParseError::PrefixTooLong(33))
        );
        assert!(matches!(
            Ipv4Net::from_cidr("10.0.3.7/x"),
            Err(CidrParseError::Mask(_))
        ));
    }
}
