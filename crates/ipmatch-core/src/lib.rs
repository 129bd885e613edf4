//! Core types for ipmatch
//!
//! This crate provides the foundational types shared by the ipmatch crates:
//! - [`Address`] - An address normalized into the 128-bit IPv6 space
//! - [`Cidr`] - A normalized address plus a prefix length
//! - [`MatchError`] - Error types
//!
//! IPv4 addresses live at the IPv4-mapped position `::ffff:a.b.c.d`, so a
//! single 128-bit coordinate space covers every supported notation.
//!
//! ```
//! use ipmatch_core::{Address, Cidr};
//! use std::net::Ipv4Addr;
//!
//! let addr = Address::from(Ipv4Addr::new(10, 1, 2, 3));
//! let cidr = Cidr::new(Address::from(Ipv4Addr::new(10, 0, 0, 0)), 104).unwrap();
//! assert!(cidr.contains(addr));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// Number of bits in a normalized address
pub const ADDRESS_BITS: u8 = 128;

/// Number of bits in an IPv4 address
pub const IPV4_BITS: u8 = 32;

/// Bit offset of an IPv4 address inside the normalized space
pub const IPV4_OFFSET: u8 = ADDRESS_BITS - IPV4_BITS;

/// Marker placed in bits 80..=95 of an IPv4-mapped address
pub const IPV4_MAPPED_PREFIX: u128 = 0xffff_0000_0000;

/// An address normalized into the 128-bit IPv6 space
///
/// The most significant bit of the inner value is the first bit of the
/// address. IPv4 addresses are embedded as `::ffff:a.b.c.d`.
///
/// # Examples
///
/// ```
/// use ipmatch_core::Address;
/// use std::net::Ipv4Addr;
///
/// let addr = Address::from(Ipv4Addr::new(192, 168, 1, 1));
/// assert_eq!(addr.0, 0xffff_c0a8_0101);
/// assert_eq!(addr.byte(15), 0x01);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub u128);

impl Address {
    /// Embed a 32-bit IPv4 value at the IPv4-mapped position
    pub fn from_ipv4_bits(value: u32) -> Self {
        Address(IPV4_MAPPED_PREFIX | value as u128)
    }

    /// Byte at `level`, counted from the most significant end (0..16)
    pub fn byte(&self, level: usize) -> u8 {
        self.0.to_be_bytes()[level]
    }

    /// Whether this address carries the `::ffff:0:0/96` marker
    pub fn is_ipv4_mapped(&self) -> bool {
        self.0 >> IPV4_BITS == IPV4_MAPPED_PREFIX >> IPV4_BITS
    }

    /// The embedded IPv4 address, if this is an IPv4-mapped address
    pub fn to_ipv4(&self) -> Option<Ipv4Addr> {
        if self.is_ipv4_mapped() {
            Some(Ipv4Addr::from(self.0 as u32))
        } else {
            None
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Ipv6Addr::from(self.0))
    }
}

impl From<u128> for Address {
    fn from(value: u128) -> Self {
        Address(value)
    }
}

impl From<Ipv4Addr> for Address {
    fn from(value: Ipv4Addr) -> Self {
        Address::from_ipv4_bits(u32::from(value))
    }
}

impl From<Ipv6Addr> for Address {
    fn from(value: Ipv6Addr) -> Self {
        Address(u128::from(value))
    }
}

impl From<IpAddr> for Address {
    fn from(value: IpAddr) -> Self {
        match value {
            IpAddr::V4(v4) => v4.into(),
            IpAddr::V6(v6) => v6.into(),
        }
    }
}

/// A normalized address plus a prefix length counted from the most
/// significant bit
///
/// Bits past `prefix_len` are kept as given; they never take part in
/// matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cidr {
    /// Normalized address
    pub address: Address,
    /// Prefix length (0-128)
    pub prefix_len: u8,
}

impl Cidr {
    /// Create a CIDR from a normalized address and prefix length
    pub fn new(address: Address, prefix_len: u8) -> Result<Self> {
        if prefix_len > ADDRESS_BITS {
            return Err(MatchError::InvalidPrefixLength(prefix_len));
        }

        Ok(Self {
            address,
            prefix_len,
        })
    }

    /// Mask covering the top `prefix_len` bits
    pub fn mask(&self) -> u128 {
        if self.prefix_len == 0 {
            0
        } else {
            u128::MAX << (ADDRESS_BITS - self.prefix_len)
        }
    }

    /// Check whether `addr` shares the top `prefix_len` bits of this CIDR
    ///
    /// This is a direct comparison against a single range; use a prefix tree
    /// for membership over many ranges.
    pub fn contains(&self, addr: Address) -> bool {
        let mask = self.mask();
        addr.0 & mask == self.address.0 & mask
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// Error types for ipmatch operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// Text is not a supported address notation
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Text is not a supported CIDR notation
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    /// Prefix length outside 0-128
    #[error("Invalid prefix length: {0} (must be 0-128)")]
    InvalidPrefixLength(u8),
}

/// Result type alias for ipmatch operations
pub type Result<T> = std::result::Result<T, MatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_embedding() {
        let addr = Address::from(Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(addr.0, 0x0000_0000_0000_0000_0000_ffff_c0a8_0101);
        assert!(addr.is_ipv4_mapped());
        assert_eq!(addr.to_ipv4(), Some(Ipv4Addr::new(192, 168, 1, 1)));
    }

    #[test]
    fn test_ipv6_identity() {
        let v6: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let addr = Address::from(v6);
        assert_eq!(addr.0, 0x2001_0db8_0000_0000_0000_0000_0000_0001);
        assert!(!addr.is_ipv4_mapped());
        assert_eq!(addr.to_ipv4(), None);
    }

    #[test]
    fn test_byte_levels() {
        let addr = Address(0x2001_0db8_0000_0000_0000_0000_0000_00ff);
        assert_eq!(addr.byte(0), 0x20);
        assert_eq!(addr.byte(1), 0x01);
        assert_eq!(addr.byte(2), 0x0d);
        assert_eq!(addr.byte(3), 0xb8);
        assert_eq!(addr.byte(15), 0xff);
    }

    #[test]
    fn test_address_display() {
        assert_eq!(Address(1).to_string(), "::1");
        assert_eq!(
            Address::from(Ipv4Addr::new(10, 0, 0, 1)).to_string(),
            "::ffff:10.0.0.1"
        );
    }

    #[test]
    fn test_cidr_new_rejects_long_prefix() {
        assert_eq!(
            Cidr::new(Address(0), 129),
            Err(MatchError::InvalidPrefixLength(129))
        );
        assert!(Cidr::new(Address(0), 128).is_ok());
    }

    #[test]
    fn test_cidr_contains() {
        // 10.0.0.0/8 in the normalized space
        let cidr = Cidr::new(Address::from(Ipv4Addr::new(10, 0, 0, 0)), 104).unwrap();
        assert!(cidr.contains(Address::from(Ipv4Addr::new(10, 1, 2, 3))));
        assert!(cidr.contains(Address::from(Ipv4Addr::new(10, 255, 255, 255))));
        assert!(!cidr.contains(Address::from(Ipv4Addr::new(11, 0, 0, 0))));
    }

    #[test]
    fn test_cidr_zero_prefix_contains_everything() {
        let cidr = Cidr::new(Address(0x1234), 0).unwrap();
        assert_eq!(cidr.mask(), 0);
        assert!(cidr.contains(Address(0)));
        assert!(cidr.contains(Address(u128::MAX)));
    }

    #[test]
    fn test_cidr_full_prefix_is_exact() {
        let cidr = Cidr::new(Address(42), 128).unwrap();
        assert!(cidr.contains(Address(42)));
        assert!(!cidr.contains(Address(43)));
    }

    #[test]
    fn test_cidr_display() {
        let cidr = Cidr::new(Address(0x2001_0db8 << 96), 32).unwrap();
        assert_eq!(cidr.to_string(), "2001:db8::/32");
    }

    #[test]
    fn test_cidr_serialization() {
        let cidr = Cidr::new(Address(1), 128).unwrap();
        let json = serde_json::to_string(&cidr).expect("serialization failed");
        assert!(json.contains("\"prefix_len\":128"));

        let back: Cidr = serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(back, cidr);
    }

    #[test]
    fn test_error_display() {
        let err = MatchError::InvalidAddress("999.1.1.1".to_string());
        assert_eq!(format!("{}", err), "Invalid address: 999.1.1.1");

        let err = MatchError::InvalidCidr("fe80::/129".to_string());
        assert_eq!(format!("{}", err), "Invalid CIDR: fe80::/129");
    }
}
