//! CIDR block parsing and range arithmetic.

use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::address::{CanonicalAddr, Family};
use crate::{Error, Result};

/// High-bit mask keeping the first `bits` bits of a byte (`bits` in 1..=7).
#[inline]
pub(crate) fn byte_mask(bits: u8) -> u8 {
    debug_assert!((1..8).contains(&bits));
    0xFFu8 << (8 - bits)
}

/// A network address plus prefix length, with host bits cleared.
///
/// # Examples
/// ```
/// use cidrtrie::CidrBlock;
///
/// let block: CidrBlock = "172.16.0.0/12".parse().unwrap();
/// assert_eq!(block.network_end().to_string(), "172.31.255.255");
///
/// // Host bits are truncated rather than rejected.
/// let block: CidrBlock = "10.1.2.3/8".parse().unwrap();
/// assert_eq!(block.to_string(), "10.0.0.0/8");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrBlock {
    network: CanonicalAddr,
    prefix_len: u8,
}

impl CidrBlock {
    /// Create a block, truncating any host bits of `addr`.
    pub fn new(addr: CanonicalAddr, prefix_len: u8) -> Result<Self> {
        let width = addr.family().bit_width();
        if prefix_len > width {
            return Err(Error::InvalidCidr(format!(
                "{}/{}: prefix length exceeds {} bits",
                addr, prefix_len, width
            )));
        }

        let mut network = addr;
        fill_host_bits(&mut network, prefix_len, false);
        Ok(Self {
            network,
            prefix_len,
        })
    }

    /// Parse `addr/len` notation. A bare address is a host route.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();

        if text.contains('/') {
            let net: IpNet = text
                .parse()
                .map_err(|_| Error::InvalidCidr(text.to_string()))?;
            let net = net.trunc();
            return Self::new(CanonicalAddr::from(net.network()), net.prefix_len());
        }

        let ip: IpAddr = text
            .parse()
            .map_err(|_| Error::InvalidCidr(text.to_string()))?;
        let addr = CanonicalAddr::from(ip);
        Self::new(addr, addr.family().bit_width())
    }

    /// Network prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Address family of the block.
    pub fn family(&self) -> Family {
        self.network.family()
    }

    /// Number of whole bytes covered by the prefix.
    pub fn full_bytes(&self) -> usize {
        (self.prefix_len / 8) as usize
    }

    /// Prefix bits spilling into the byte after the whole bytes.
    pub fn remainder_bits(&self) -> u8 {
        self.prefix_len % 8
    }

    /// First address of the block.
    pub fn network_start(&self) -> CanonicalAddr {
        self.network
    }

    /// Last address of the block.
    pub fn network_end(&self) -> CanonicalAddr {
        let mut end = self.network;
        fill_host_bits(&mut end, self.prefix_len, true);
        end
    }

    /// Whether `addr` lies inside the block.
    pub fn contains(&self, addr: &CanonicalAddr) -> bool {
        addr.family() == self.family() && self.network_start() <= *addr && *addr <= self.network_end()
    }
}

impl FromStr for CidrBlock {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// Set (or clear) every bit after the first `prefix_len` bits.
pub(crate) fn fill_host_bits(addr: &mut CanonicalAddr, prefix_len: u8, set: bool) {
    let bytes: &mut [u8] = match addr {
        CanonicalAddr::V4(b) => b,
        CanonicalAddr::V6(b) => b,
    };

    let full = (prefix_len / 8) as usize;
    let rem = prefix_len % 8;
    let mut host_start = full;

    if rem > 0 {
        let mask = byte_mask(rem);
        bytes[full] = if set {
            bytes[full] | !mask
        } else {
            bytes[full] & mask
        };
        host_start += 1;
    }

    for b in bytes.iter_mut().skip(host_start) {
        *b = if set { 0xFF } else { 0x00 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        let block = CidrBlock::parse("192.168.0.0/16").unwrap();
        assert_eq!(block.prefix_len(), 16);
        assert_eq!(block.family(), Family::V4);
        assert_eq!(block.full_bytes(), 2);
        assert_eq!(block.remainder_bits(), 0);
        assert_eq!(block.network_start(), CanonicalAddr::V4([192, 168, 0, 0]));
        assert_eq!(block.network_end(), CanonicalAddr::V4([192, 168, 255, 255]));
    }

    #[test]
    fn test_partial_byte_range() {
        let block = CidrBlock::parse("172.16.0.0/12").unwrap();
        assert_eq!(block.full_bytes(), 1);
        assert_eq!(block.remainder_bits(), 4);
        assert_eq!(block.network_end(), CanonicalAddr::V4([172, 31, 255, 255]));

        let v6 = CidrBlock::parse("fc00::/7").unwrap();
        assert_eq!(v6.network_end().to_string(), "fdff:ffff:ffff:ffff:ffff:ffff:ffff:ffff");
    }

    #[test]
    fn test_host_bits_truncated() {
        let block = CidrBlock::parse("10.1.2.3/8").unwrap();
        assert_eq!(block.network_start(), CanonicalAddr::V4([10, 0, 0, 0]));

        let block = CidrBlock::parse("172.20.1.1/12").unwrap();
        assert_eq!(block.network_start(), CanonicalAddr::V4([172, 16, 0, 0]));
    }

    #[test]
    fn test_bare_address_is_host_route() {
        let block = CidrBlock::parse("8.8.8.8").unwrap();
        assert_eq!(block.prefix_len(), 32);
        assert_eq!(block.network_start(), block.network_end());

        let block = CidrBlock::parse("::1").unwrap();
        assert_eq!(block.prefix_len(), 128);
    }

    #[test]
    fn test_zero_prefix() {
        let block = CidrBlock::parse("0.0.0.0/0").unwrap();
        assert_eq!(block.network_end(), CanonicalAddr::V4([255; 4]));

        let block = CidrBlock::parse("::/0").unwrap();
        assert_eq!(block.network_end(), CanonicalAddr::V6([255; 16]));
    }

    #[test]
    fn test_invalid_cidr() {
        assert!(CidrBlock::parse("invalid").is_err());
        assert!(CidrBlock::parse("192.168.1.1/33").is_err());
        assert!(CidrBlock::parse("2001:db8::/129").is_err());
        assert!(CidrBlock::parse("10.0.0.0/").is_err());
        assert!(CidrBlock::parse("").is_err());

        let err = CidrBlock::parse("10.0.0.0/40").unwrap_err();
        assert!(matches!(err, Error::InvalidCidr(_)));
    }

    #[test]
    fn test_contains() {
        let block = CidrBlock::parse("172.16.0.0/12").unwrap();
        assert!(block.contains(&CanonicalAddr::V4([172, 17, 0, 5])));
        assert!(!block.contains(&CanonicalAddr::V4([172, 32, 0, 1])));
        assert!(!block.contains(&CanonicalAddr::V6([0; 16])));
    }

    #[test]
    fn test_display() {
        let block: CidrBlock = "2001:db8::/32".parse().unwrap();
        assert_eq!(block.to_string(), "2001:db8::/32");
    }
}
