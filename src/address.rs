//! Address normalization.
//!
//! Every accepted input representation is reduced to a [`CanonicalAddr`],
//! the fixed-length big-endian byte form the trie walks over.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::{Error, Result};

/// Canonical byte length of an IPv4 address.
pub const V4_LEN: usize = 4;

/// Canonical byte length of an IPv6 address.
pub const V6_LEN: usize = 16;

/// Address family of a canonical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// 4-byte addresses
    V4,
    /// 16-byte addresses
    V6,
}

impl Family {
    /// Number of bytes in the canonical form.
    pub fn byte_len(self) -> usize {
        match self {
            Family::V4 => V4_LEN,
            Family::V6 => V6_LEN,
        }
    }

    /// Number of bits in the canonical form.
    pub fn bit_width(self) -> u8 {
        (self.byte_len() * 8) as u8
    }
}

/// Fixed-length byte form of an address.
///
/// Ordering within one family is lexicographic over the bytes, which is the
/// numeric order of the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalAddr {
    /// IPv4 octets
    V4([u8; V4_LEN]),
    /// IPv6 octets
    V6([u8; V6_LEN]),
}

impl CanonicalAddr {
    /// Build from a raw byte slice of exactly 4 or 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            V4_LEN => {
                let mut octets = [0u8; V4_LEN];
                octets.copy_from_slice(bytes);
                Ok(CanonicalAddr::V4(octets))
            }
            V6_LEN => {
                let mut octets = [0u8; V6_LEN];
                octets.copy_from_slice(bytes);
                Ok(CanonicalAddr::V6(octets))
            }
            n => Err(Error::InvalidAddress(format!(
                "expected 4 or 16 bytes, got {}",
                n
            ))),
        }
    }

    /// The address bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            CanonicalAddr::V4(b) => b,
            CanonicalAddr::V6(b) => b,
        }
    }

    /// Address family.
    pub fn family(&self) -> Family {
        match self {
            CanonicalAddr::V4(_) => Family::V4,
            CanonicalAddr::V6(_) => Family::V6,
        }
    }

    /// Convert back to a standard library address.
    pub fn to_ip(&self) -> IpAddr {
        match *self {
            CanonicalAddr::V4(b) => IpAddr::V4(Ipv4Addr::from(b)),
            CanonicalAddr::V6(b) => IpAddr::V6(Ipv6Addr::from(b)),
        }
    }
}

impl From<IpAddr> for CanonicalAddr {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => CanonicalAddr::V4(v4.octets()),
            IpAddr::V6(v6) => CanonicalAddr::V6(v6.octets()),
        }
    }
}

impl fmt::Display for CanonicalAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ip())
    }
}

/// An address in any accepted input representation.
///
/// # Examples
/// ```
/// use cidrtrie::{Address, CanonicalAddr};
///
/// let text = Address::from("10.0.0.1").normalize().unwrap();
/// let bytes = Address::from(&[10u8, 0, 0, 1]).normalize().unwrap();
/// let int = Address::from(0x0A00_0001u32).normalize().unwrap();
///
/// assert_eq!(text, CanonicalAddr::V4([10, 0, 0, 1]));
/// assert_eq!(text, bytes);
/// assert_eq!(text, int);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address<'a> {
    /// Dotted-quad or colon notation
    Text(&'a str),
    /// Raw 4- or 16-byte sequence
    Bytes(&'a [u8]),
    /// Numeric address; values above `u32::MAX` are IPv6
    Integer(u128),
    /// Standard library address value
    Ip(IpAddr),
}

impl Address<'_> {
    /// Produce the canonical byte form.
    pub fn normalize(&self) -> Result<CanonicalAddr> {
        match *self {
            Address::Text(s) => s
                .trim()
                .parse::<IpAddr>()
                .map(CanonicalAddr::from)
                .map_err(|_| Error::InvalidAddress(s.to_string())),
            Address::Bytes(b) => CanonicalAddr::from_slice(b),
            Address::Integer(v) => Ok(if v <= u32::MAX as u128 {
                CanonicalAddr::V4((v as u32).to_be_bytes())
            } else {
                CanonicalAddr::V6(v.to_be_bytes())
            }),
            Address::Ip(ip) => Ok(CanonicalAddr::from(ip)),
        }
    }

    /// Owned copy of the input exactly as given.
    pub(crate) fn to_raw(&self) -> RawAddress {
        match *self {
            Address::Text(s) => RawAddress::Text(s.into()),
            Address::Bytes(b) => RawAddress::Bytes(b.into()),
            Address::Integer(v) => RawAddress::Integer(v),
            Address::Ip(ip) => RawAddress::Ip(ip),
        }
    }
}

/// Owned input representation, used as a cache key when no normalization
/// happens before the lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum RawAddress {
    Text(Box<str>),
    Bytes(Box<[u8]>),
    Integer(u128),
    Ip(IpAddr),
}

impl<'a> From<&'a str> for Address<'a> {
    fn from(s: &'a str) -> Self {
        Address::Text(s)
    }
}

impl<'a> From<&'a String> for Address<'a> {
    fn from(s: &'a String) -> Self {
        Address::Text(s.as_str())
    }
}

impl<'a> From<&'a [u8]> for Address<'a> {
    fn from(b: &'a [u8]) -> Self {
        Address::Bytes(b)
    }
}

impl<'a> From<&'a [u8; V4_LEN]> for Address<'a> {
    fn from(b: &'a [u8; V4_LEN]) -> Self {
        Address::Bytes(b)
    }
}

impl<'a> From<&'a [u8; V6_LEN]> for Address<'a> {
    fn from(b: &'a [u8; V6_LEN]) -> Self {
        Address::Bytes(b)
    }
}

impl From<u32> for Address<'_> {
    fn from(v: u32) -> Self {
        Address::Integer(v as u128)
    }
}

impl From<u128> for Address<'_> {
    fn from(v: u128) -> Self {
        Address::Integer(v)
    }
}

impl From<IpAddr> for Address<'_> {
    fn from(ip: IpAddr) -> Self {
        Address::Ip(ip)
    }
}

impl From<Ipv4Addr> for Address<'_> {
    fn from(ip: Ipv4Addr) -> Self {
        Address::Ip(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for Address<'_> {
    fn from(ip: Ipv6Addr) -> Self {
        Address::Ip(IpAddr::V6(ip))
    }
}

impl<'a> From<&'a CanonicalAddr> for Address<'a> {
    fn from(addr: &'a CanonicalAddr) -> Self {
        Address::Bytes(addr.as_bytes())
    }
}
