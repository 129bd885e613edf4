//! Address and CIDR normalization
//!
//! Converts the supported textual notations into one 128-bit space:
//! - Full IPv6 (`2001:0db8:0000:0000:0000:0000:0000:0001`)
//! - Abbreviated IPv6 (`2001:db8::1`)
//! - IPv4 (`192.168.1.1`), embedded as `::ffff:192.168.1.1`
//! - IPv4-mapped IPv6 (`::ffff:192.168.1.1`)
//!
//! Every grammar is a pure function returning `Option`; the public entry
//! points try them in order and report a single error when none applies.
//!
//! # Examples
//!
//! ```
//! use ipmatch_cidr::{parse_address, parse_cidr};
//!
//! let cidr = parse_cidr("10.0.0.0/8").unwrap();
//! assert_eq!(cidr.prefix_len, 104);
//! assert!(cidr.contains(parse_address("10.1.2.3").unwrap()));
//! assert!(!cidr.contains(parse_address("11.0.0.0").unwrap()));
//!
//! assert_eq!(
//!     parse_address("192.168.1.1").unwrap(),
//!     parse_address("::ffff:192.168.1.1").unwrap(),
//! );
//! ```

use ipmatch_core::{Address, Cidr, MatchError, Result, ADDRESS_BITS, IPV4_BITS, IPV4_OFFSET};
use serde::Serialize;
use std::fmt;

/// Number of 16-bit groups in an IPv6 address
const IPV6_GROUPS: usize = 8;

/// Separator between an address and its prefix length
const CIDR_SEPARATOR: char = '/';

/// Value the part before an embedded IPv4 suffix must normalize to
const IPV4_MAPPED_MARKER: u128 = 0xffff;

/// Textual family an address was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFamily {
    /// Full or abbreviated IPv6
    Ipv6,
    /// Dotted-quad IPv4
    Ipv4,
    /// IPv6 with a trailing dotted-quad IPv4 suffix
    Ipv4Mapped,
}

impl AddressFamily {
    /// Range of prefix lengths accepted in CIDR notation
    fn prefix_range(&self) -> (u8, u8) {
        match self {
            AddressFamily::Ipv6 => (0, ADDRESS_BITS),
            AddressFamily::Ipv4 => (0, IPV4_BITS),
            AddressFamily::Ipv4Mapped => (IPV4_OFFSET, ADDRESS_BITS),
        }
    }

    /// Translate a written prefix length into the 128-bit space
    fn normalize_prefix(&self, prefix_len: u8) -> u8 {
        match self {
            AddressFamily::Ipv4 => prefix_len + IPV4_OFFSET,
            AddressFamily::Ipv6 | AddressFamily::Ipv4Mapped => prefix_len,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressFamily::Ipv6 => "IPv6",
            AddressFamily::Ipv4 => "IPv4",
            AddressFamily::Ipv4Mapped => "IPv4-mapped IPv6",
        };
        f.write_str(name)
    }
}

/// Parse an address in any supported notation
///
/// Hexadecimal digits are matched case-insensitively. Surrounding
/// whitespace is not accepted.
///
/// # Examples
///
/// ```
/// use ipmatch_cidr::parse_address;
///
/// let full = parse_address("2001:0db8:0000:0000:0000:0000:0000:0001").unwrap();
/// let short = parse_address("2001:DB8::1").unwrap();
/// assert_eq!(full, short);
/// assert!(parse_address("999.1.1.1").is_err());
/// ```
pub fn parse_address(text: &str) -> Result<Address> {
    parse_address_with_family(text).map(|(address, _)| address)
}

/// Parse an address and report which notation it was written in
pub fn parse_address_with_family(text: &str) -> Result<(Address, AddressFamily)> {
    let lowered = text.to_ascii_lowercase();

    parse_ipv6(&lowered)
        .map(|addr| (addr, AddressFamily::Ipv6))
        .or_else(|| parse_ipv4(&lowered).map(|addr| (addr, AddressFamily::Ipv4)))
        .or_else(|| parse_ipv4_mapped(&lowered).map(|addr| (addr, AddressFamily::Ipv4Mapped)))
        .ok_or_else(|| MatchError::InvalidAddress(text.to_string()))
}

/// Detect the notation of an address without keeping the value
pub fn detect_family(text: &str) -> Option<AddressFamily> {
    parse_address_with_family(text).ok().map(|(_, family)| family)
}

/// Parse CIDR notation in any supported family
///
/// The prefix length is translated into the 128-bit space: an IPv4 `/L`
/// becomes `/L+96`, IPv6 and IPv4-mapped lengths are kept as written.
/// Bits past the prefix are kept as given.
///
/// # Examples
///
/// ```
/// use ipmatch_cidr::parse_cidr;
///
/// assert_eq!(parse_cidr("192.168.0.0/16").unwrap().prefix_len, 112);
/// assert_eq!(parse_cidr("::ffff:192.168.0.0/112").unwrap().prefix_len, 112);
/// assert_eq!(parse_cidr("fe80::/10").unwrap().prefix_len, 10);
/// assert!(parse_cidr("fe80::/129").is_err());
/// ```
pub fn parse_cidr(text: &str) -> Result<Cidr> {
    parse_cidr_with_family(text).map(|(cidr, _)| cidr)
}

/// Parse CIDR notation and report which family the address was written in
pub fn parse_cidr_with_family(text: &str) -> Result<(Cidr, AddressFamily)> {
    let invalid = || MatchError::InvalidCidr(text.to_string());

    let lowered = text.to_ascii_lowercase();
    let (address, prefix) = lowered
        .trim()
        .split_once(CIDR_SEPARATOR)
        .ok_or_else(invalid)?;
    let prefix_len = parse_prefix_len(prefix).ok_or_else(invalid)?;

    cidr_in_family(address, prefix_len, AddressFamily::Ipv6)
        .or_else(|| cidr_in_family(address, prefix_len, AddressFamily::Ipv4))
        .or_else(|| cidr_in_family(address, prefix_len, AddressFamily::Ipv4Mapped))
        .ok_or_else(invalid)
}

fn cidr_in_family(
    address: &str,
    prefix_len: u16,
    family: AddressFamily,
) -> Option<(Cidr, AddressFamily)> {
    let (min, max) = family.prefix_range();
    let prefix_len = u8::try_from(prefix_len).ok()?;
    if prefix_len < min || prefix_len > max {
        return None;
    }

    let address = match family {
        AddressFamily::Ipv6 => parse_ipv6(address)?,
        AddressFamily::Ipv4 => parse_ipv4(address)?,
        AddressFamily::Ipv4Mapped => parse_ipv4_mapped(address)?,
    };

    let cidr = Cidr {
        address,
        prefix_len: family.normalize_prefix(prefix_len),
    };
    Some((cidr, family))
}

/// Parse a prefix length written as canonical decimal
///
/// Rejects empty text, signs, whitespace and leading zeros (`0` itself is
/// accepted). Range checks are left to the family.
fn parse_prefix_len(text: &str) -> Option<u16> {
    if text.is_empty() || text.len() > 3 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if text.len() > 1 && text.starts_with('0') {
        return None;
    }
    text.parse().ok()
}

/// Parse a full or abbreviated IPv6 address
///
/// # Examples
///
/// ```
/// use ipmatch_cidr::parse_ipv6;
///
/// assert_eq!(parse_ipv6("::1").unwrap().0, 1);
/// assert_eq!(parse_ipv6("::ffff").unwrap().0, 0xffff);
/// assert!(parse_ipv6("1::2::3").is_none());
/// ```
pub fn parse_ipv6(text: &str) -> Option<Address> {
    parse_full_ipv6(text).or_else(|| parse_abbreviated_ipv6(text))
}

/// Exactly eight groups of one to four hex digits
fn parse_full_ipv6(text: &str) -> Option<Address> {
    let groups = parse_groups(text)?;
    if groups.len() != IPV6_GROUPS {
        return None;
    }
    Some(join_groups(&groups))
}

/// One `::` with a group list on either side; either side may be empty
fn parse_abbreviated_ipv6(text: &str) -> Option<Address> {
    let (left, right) = text.split_once("::")?;
    let left = parse_side(left)?;
    let right = parse_side(right)?;

    let zeros = IPV6_GROUPS.checked_sub(left.len() + right.len())?;

    let mut groups = left;
    groups.resize(groups.len() + zeros, 0);
    groups.extend(right);
    Some(join_groups(&groups))
}

fn parse_side(text: &str) -> Option<Vec<u16>> {
    if text.is_empty() {
        Some(Vec::new())
    } else {
        parse_groups(text)
    }
}

fn parse_groups(text: &str) -> Option<Vec<u16>> {
    text.split(':').map(parse_group).collect()
}

fn parse_group(text: &str) -> Option<u16> {
    if text.is_empty() || text.len() > 4 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(text, 16).ok()
}

fn join_groups(groups: &[u16]) -> Address {
    let value = groups
        .iter()
        .fold(0u128, |acc, &group| (acc << 16) | group as u128);
    Address(value)
}

/// Parse a dotted-quad IPv4 address into its IPv4-mapped position
///
/// Each octet is one to three decimal digits with a value of at most 255.
///
/// # Examples
///
/// ```
/// use ipmatch_cidr::parse_ipv4;
///
/// assert_eq!(parse_ipv4("10.0.0.1").unwrap().0, 0xffff_0a00_0001);
/// assert!(parse_ipv4("256.0.0.1").is_none());
/// assert!(parse_ipv4("1.2.3").is_none());
/// ```
pub fn parse_ipv4(text: &str) -> Option<Address> {
    let mut value = 0u32;
    let mut octets = 0;

    for part in text.split('.') {
        if octets == 4 {
            return None;
        }
        value = (value << 8) | parse_octet(part)? as u32;
        octets += 1;
    }

    if octets != 4 {
        return None;
    }
    Some(Address::from_ipv4_bits(value))
}

fn parse_octet(text: &str) -> Option<u8> {
    if text.is_empty() || text.len() > 3 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<u16>().ok().and_then(|v| u8::try_from(v).ok())
}

/// Parse an IPv6 address ending in a dotted-quad IPv4 suffix
///
/// The part before the last colon must itself be a full or abbreviated IPv6
/// address equal to `0xffff`, e.g. `::ffff` or `0::ffff`.
///
/// # Examples
///
/// ```
/// use ipmatch_cidr::{parse_ipv4, parse_ipv4_mapped};
///
/// assert_eq!(parse_ipv4_mapped("::ffff:10.0.0.1"), parse_ipv4("10.0.0.1"));
/// assert!(parse_ipv4_mapped("::fffe:10.0.0.1").is_none());
/// ```
pub fn parse_ipv4_mapped(text: &str) -> Option<Address> {
    let split = text.rfind(':')?;
    let (ipv6, ipv4) = (&text[..split], &text[split + 1..]);

    if parse_ipv6(ipv6)?.0 != IPV4_MAPPED_MARKER {
        return None;
    }
    parse_ipv4(ipv4)
}
