// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

use std::fmt;
use std::net::Ipv4Addr as StdIpv4Addr;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 32-bit IPv4 address, stored in host byte order.
///
/// This is a thin, total-order newtype over the address value so it can be
/// used directly as a map key and hashed, while still round-tripping
/// bit-exactly to the network byte order the PIM-SM wire format requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Addr(u32);

impl Addr {
    pub const UNSPECIFIED: Addr = Addr(0);
    pub const BROADCAST: Addr = Addr(0xffff_ffff);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Addr {
        Addr(u32::from_be_bytes([a, b, c, d]))
    }

    pub const fn from_bits(bits: u32) -> Addr {
        Addr(bits)
    }

    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Serializes the address to a 4-byte network-byte-order array, as it
    /// appears in an encoded PIM address record.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    #[must_use]
    pub const fn from_be_bytes(b: [u8; 4]) -> Addr {
        Addr(u32::from_be_bytes(b))
    }

    #[must_use]
    pub const fn is_default(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_loopback(self) -> bool {
        (self.0 >> 24) == 127
    }

    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST.0
    }

    /// True for 224.0.0.0/4.
    #[must_use]
    pub const fn is_multicast(self) -> bool {
        (self.0 >> 28) == 0xe
    }
}

impl From<StdIpv4Addr> for Addr {
    fn from(a: StdIpv4Addr) -> Self {
        Addr(u32::from(a))
    }
}

impl From<Addr> for StdIpv4Addr {
    fn from(a: Addr) -> Self {
        StdIpv4Addr::from(a.0)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("invalid IPv4 address {0:?}")]
pub struct AddrParseError(String);

impl FromStr for Addr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<StdIpv4Addr>()
            .map(Addr::from)
            .map_err(|_| AddrParseError(s.to_owned()))
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", StdIpv4Addr::from(*self))
    }
}

impl Serialize for Addr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct AddrVisitor;

impl Visitor<'_> for AddrVisitor {
    type Value = Addr;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a dotted-quad IPv4 address")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Addr, E> {
        v.parse().map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Addr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(AddrVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_dotted_quad() {
        let a: Addr = "239.1.1.1".parse().unwrap();
        assert_eq!(a.to_string(), "239.1.1.1");
        assert_eq!(a.to_be_bytes(), [239, 1, 1, 1]);
    }

    #[test]
    fn predicates() {
        assert!(Addr::new(239, 1, 1, 1).is_multicast());
        assert!(!Addr::new(10, 0, 0, 1).is_multicast());
        assert!(Addr::new(127, 0, 0, 1).is_loopback());
        assert!(Addr::UNSPECIFIED.is_default());
        assert!(Addr::BROADCAST.is_broadcast());
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(Addr::new(10, 0, 0, 1) < Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn rejects_garbage() {
        assert!("not-an-address".parse::<Addr>().is_err());
    }
}
