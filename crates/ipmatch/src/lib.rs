//! CIDR matching for IPv4 and IPv6 addresses
//!
//! [`Matcher`] stores CIDR ranges written as IPv4, full or abbreviated IPv6,
//! or IPv4-mapped IPv6, and answers whether an address in any of those
//! notations falls inside a stored range. All notations share one 128-bit
//! space, so `192.168.0.0/16` matches `::ffff:192.168.1.1` and
//! `::ffff:192.168.0.0/112` matches `192.168.1.1`.
//!
//! # Examples
//!
//! ```
//! use ipmatch::Matcher;
//!
//! let mut matcher = Matcher::new();
//! matcher.add("10.0.0.0/8")?;
//! matcher.add("2001:db8::/32")?;
//!
//! assert!(matcher.has("10.1.2.3")?);
//! assert!(matcher.has("2001:db8:1:2::3")?);
//! assert!(!matcher.has("11.0.0.0")?);
//! # Ok::<(), ipmatch::MatchError>(())
//! ```

pub use ipmatch_cidr::{
    parse_address, parse_address_with_family, parse_cidr, parse_cidr_with_family, AddressFamily,
};
pub use ipmatch_core::{Address, Cidr, MatchError, Result};

use ipmatch_tree::PrefixTree;
use tracing::{debug, trace};

/// A set of CIDR ranges supporting fast membership queries
///
/// Queries cost at most 16 tree levels regardless of how many ranges are
/// stored. `&Matcher` can be shared between threads for concurrent
/// queries; adding ranges needs `&mut`.
#[derive(Debug, Default)]
pub struct Matcher {
    tree: PrefixTree,
}

impl Matcher {
    /// Create an empty matcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a matcher holding every range in `cidrs`
    ///
    /// # Examples
    ///
    /// ```
    /// use ipmatch::Matcher;
    ///
    /// let matcher = Matcher::from_cidrs(["10.0.0.0/8", "fe80::/10"])?;
    /// assert!(matcher.has("fe80::1")?);
    /// # Ok::<(), ipmatch::MatchError>(())
    /// ```
    pub fn from_cidrs<I, S>(cidrs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::new();
        matcher.add_all(cidrs)?;
        Ok(matcher)
    }

    /// Add a range written in CIDR notation
    ///
    /// A rejected range leaves the matcher unchanged.
    pub fn add(&mut self, cidr: &str) -> Result<()> {
        let parsed = parse_cidr(cidr).map_err(|e| {
            debug!(cidr, "rejected range");
            e
        })?;
        self.insert(parsed);
        Ok(())
    }

    /// Add every range in `cidrs`, stopping at the first invalid one
    ///
    /// Ranges before the invalid one stay added.
    pub fn add_all<I, S>(&mut self, cidrs: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for cidr in cidrs {
            self.add(cidr.as_ref())?;
        }
        Ok(())
    }

    /// Add an already parsed range
    pub fn insert(&mut self, cidr: Cidr) {
        debug!(range = %cidr, "adding range");
        self.tree.insert_cidr(&cidr);
    }

    /// Check whether an address falls inside any stored range
    pub fn has(&self, address: &str) -> Result<bool> {
        let parsed = parse_address(address).map_err(|e| {
            debug!(address, "rejected address");
            e
        })?;
        Ok(self.contains(parsed))
    }

    /// Check an already parsed or standard-library address
    ///
    /// # Examples
    ///
    /// ```
    /// use ipmatch::Matcher;
    /// use std::net::Ipv4Addr;
    ///
    /// let matcher = Matcher::from_cidrs(["::ffff:192.168.0.0/112"])?;
    /// assert!(matcher.contains(Ipv4Addr::new(192, 168, 5, 5)));
    /// # Ok::<(), ipmatch::MatchError>(())
    /// ```
    pub fn contains(&self, address: impl Into<Address>) -> bool {
        let address = address.into();
        let found = self.tree.contains(address);
        trace!(%address, found, "lookup");
        found
    }

    /// Number of distinct ranges stored
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether no range has been added
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
