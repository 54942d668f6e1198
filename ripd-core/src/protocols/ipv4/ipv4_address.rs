use std::{
    fmt::{self, Display},
    net::Ipv4Addr,
    str::FromStr,
};

/// Represents an address used by the IPv4 protocol.
///
/// Bytes are stored in network order, so `10.0.1.2` is `[10, 0, 1, 2]` and
/// converts to the `u32` `0x0a00_0102`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ipv4Address([u8; 4]);

impl Ipv4Address {
    /// The address `0.0.0.0`. On the wire it stands in for "no next hop".
    pub const UNSPECIFIED: Self = Self([0u8, 0, 0, 0]);

    /// The address `224.0.0.9`, the multicast group of RIP version 2 routers.
    pub const RIP_MULTICAST: Self = Self([224u8, 0, 0, 9]);

    /// Creates a new address.
    pub const fn new(address: [u8; 4]) -> Self {
        Self(address)
    }

    /// Gets the address as a `u32`.
    pub fn to_u32(self) -> u32 {
        self.into()
    }

    /// Gets the address as a `[u8; 4]`.
    pub fn to_bytes(self) -> [u8; 4] {
        self.into()
    }
}

impl Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

impl FromStr for Ipv4Address {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Ipv4Addr::from_str(s)?.into())
    }
}

impl From<u32> for Ipv4Address {
    fn from(n: u32) -> Self {
        Self::from(n.to_be_bytes())
    }
}

impl From<[u8; 4]> for Ipv4Address {
    fn from(n: [u8; 4]) -> Self {
        Self(n)
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(address: Ipv4Addr) -> Self {
        Self(address.octets())
    }
}

impl From<Ipv4Address> for u32 {
    fn from(address: Ipv4Address) -> Self {
        u32::from_be_bytes(address.0)
    }
}

impl From<Ipv4Address> for [u8; 4] {
    fn from(address: Ipv4Address) -> Self {
        address.0
    }
}

impl From<Ipv4Address> for Ipv4Addr {
    fn from(address: Ipv4Address) -> Self {
        Ipv4Addr::from(address.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_order() {
        let address = Ipv4Address::new([10, 0, 1, 2]);
        assert_eq!(address.to_u32(), 0x0a00_0102);
        assert_eq!(Ipv4Address::from(0x0a00_0102), address);
        assert_eq!(address.to_string(), "10.0.1.2");
        assert_eq!("10.0.1.2".parse::<Ipv4Address>(), Ok(address));
    }
}
