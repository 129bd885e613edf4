//! Byte-level prefix tree over the 128-bit address space
//!
//! Each level consumes one byte of the address, so a query never visits
//! more than 16 levels no matter how many prefixes are stored.
//!
//! Prefixes that end on a byte boundary are stored as a `terminal` flag on
//! the node reached through exact byte keys. Prefixes that end mid-byte are
//! stored as a *tagged* child of the last full-byte node: the pair of the
//! partial bit count (1-7) and the byte with its uncovered low bits cleared.
//! Each node also keeps the distinct partial bit counts of its tagged
//! children, so a query only has to try the lengths actually present.
//!
//! # Examples
//!
//! ```
//! use ipmatch_core::Address;
//! use ipmatch_tree::PrefixTree;
//!
//! let mut tree = PrefixTree::new();
//! // fe80::/10
//! tree.insert(Address(0xfe80 << 112), 10);
//!
//! assert!(tree.contains(Address((0xfe80 << 112) | 1)));
//! assert!(tree.contains(Address(0xfebf << 112)));
//! assert!(!tree.contains(Address(0xfec0 << 112)));
//! ```

use ipmatch_core::{Address, Cidr, ADDRESS_BITS};
use std::collections::{HashMap, HashSet};

/// Bits consumed per tree level
const BITS_PER_LEVEL: u8 = 8;

/// Maximum tree depth
const LEVELS: usize = (ADDRESS_BITS / BITS_PER_LEVEL) as usize;

/// Key of a prefix that ends part-way through a byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TaggedKey {
    /// Bits of the byte covered by the prefix (1-7)
    partial_len: u8,
    /// The byte with its low `8 - partial_len` bits cleared
    masked: u8,
}

impl TaggedKey {
    fn new(byte: u8, partial_len: u8) -> Self {
        debug_assert!((1..BITS_PER_LEVEL).contains(&partial_len));
        Self {
            partial_len,
            masked: byte & !(0xff >> partial_len),
        }
    }
}

#[derive(Debug, Default)]
struct Node {
    /// Children continuing the prefix past this byte
    exact: HashMap<u8, Node>,
    /// Prefixes ending inside the next byte; always terminal, never descended
    tagged: HashSet<TaggedKey>,
    /// Distinct `partial_len` values present in `tagged`, in insertion order
    partial_lengths: Vec<u8>,
    /// A stored prefix ends exactly at this node
    terminal: bool,
}

impl Node {
    fn matches_tagged(&self, byte: u8) -> bool {
        self.partial_lengths
            .iter()
            .any(|&len| self.tagged.contains(&TaggedKey::new(byte, len)))
    }
}

/// Prefix tree answering "is this address inside any stored prefix"
///
/// Build it with [`insert`](Self::insert), then query with
/// [`contains`](Self::contains). Prefixes cannot be removed.
#[derive(Debug)]
pub struct PrefixTree {
    root: Node,
    prefixes: usize,
    nodes: usize,
}

impl PrefixTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            root: Node::default(),
            prefixes: 0,
            nodes: 1,
        }
    }

    /// Store the prefix made of the top `prefix_len` bits of `address`
    ///
    /// Bits past `prefix_len` are ignored. Inserting a prefix that is
    /// already stored leaves the tree unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `prefix_len` is greater than 128.
    pub fn insert(&mut self, address: Address, prefix_len: u8) {
        assert!(
            prefix_len <= ADDRESS_BITS,
            "prefix length {} exceeds {} bits",
            prefix_len,
            ADDRESS_BITS
        );

        if prefix_len == 0 {
            if !self.root.terminal {
                self.root.terminal = true;
                self.prefixes += 1;
            }
            return;
        }

        let bytes = address.0.to_be_bytes();
        let mut node = &mut self.root;

        for (level, &byte) in bytes.iter().enumerate() {
            let depth = level as u8 * BITS_PER_LEVEL;
            if depth >= prefix_len {
                break;
            }
            let remaining = prefix_len - depth;

            if remaining < BITS_PER_LEVEL {
                if !node.partial_lengths.contains(&remaining) {
                    node.partial_lengths.push(remaining);
                }
                if node.tagged.insert(TaggedKey::new(byte, remaining)) {
                    self.prefixes += 1;
                    self.nodes += 1;
                }
                return;
            }

            let nodes = &mut self.nodes;
            let child = node.exact.entry(byte).or_insert_with(|| {
                *nodes += 1;
                Node::default()
            });

            if remaining == BITS_PER_LEVEL && !child.terminal {
                child.terminal = true;
                self.prefixes += 1;
            }
            node = child;
        }
    }

    /// Store a parsed CIDR
    pub fn insert_cidr(&mut self, cidr: &Cidr) {
        self.insert(cidr.address, cidr.prefix_len);
    }

    /// Check whether `address` falls under any stored prefix
    ///
    /// Returns on the first stored prefix found along the address's path,
    /// which is not necessarily the longest one.
    pub fn contains(&self, address: Address) -> bool {
        let mut node = &self.root;
        if node.terminal {
            return true;
        }

        for &byte in address.0.to_be_bytes().iter() {
            // A prefix ending inside this byte may sit next to a longer
            // prefix that continues through the same byte.
            if node.matches_tagged(byte) {
                return true;
            }

            match node.exact.get(&byte) {
                Some(child) if child.terminal => return true,
                Some(child) => node = child,
                None => return false,
            }
        }

        false
    }

    /// Number of distinct prefixes stored
    pub fn len(&self) -> usize {
        self.prefixes
    }

    /// Whether no prefix has been stored
    pub fn is_empty(&self) -> bool {
        self.prefixes == 0
    }

    /// Number of nodes, including the root and tagged leaves
    pub fn node_count(&self) -> usize {
        self.nodes
    }
}

impl Default for PrefixTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod proptests;
