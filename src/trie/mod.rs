//! Byte-indexed prefix trie over canonical addresses.
//!
//! The root branches on address family first, so a `/0` in one family
//! never matches addresses of the other. Below each family root every
//! level consumes one address byte. A CIDR whose prefix ends mid-byte
//! terminates at a single child keyed by the masked byte; lookups cover
//! the rest of that byte with a range scan over the parent's children.

mod node;

pub use node::{NetworkRange, TrieNode};

pub(crate) use node::{prefix_bit, widest_prefix};

use std::sync::Arc;

use crate::address::{CanonicalAddr, Family};
use crate::cidr::{byte_mask, CidrBlock};
use crate::{Error, Result};

/// Prefix trie holding CIDR blocks of both address families.
///
/// Cloning is O(1): nodes are shared and copied on write, which lets a
/// writer prepare the next version while readers keep using this one.
#[derive(Debug, Clone, Default)]
pub struct Trie {
    v4: Arc<TrieNode>,
    v6: Arc<TrieNode>,
    len: usize,
}

impl Trie {
    /// Create an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(v4: TrieNode, v6: TrieNode, len: usize) -> Self {
        Self {
            v4: Arc::new(v4),
            v6: Arc::new(v6),
            len,
        }
    }

    /// Number of inserted CIDR blocks.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no CIDR blocks are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Family partition root.
    pub fn root(&self, family: Family) -> &TrieNode {
        match family {
            Family::V4 => &self.v4,
            Family::V6 => &self.v6,
        }
    }

    fn root_mut(&mut self, family: Family) -> &mut TrieNode {
        match family {
            Family::V4 => Arc::make_mut(&mut self.v4),
            Family::V6 => Arc::make_mut(&mut self.v6),
        }
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Insert a block. Returns false if it was already present.
    pub fn insert(&mut self, block: &CidrBlock) -> bool {
        let start = block.network_start();
        let end = block.network_end();
        let bytes = start.as_bytes();
        let full = block.full_bytes();
        let rem = block.remainder_bits();

        let mut node = self.root_mut(block.family());
        for &byte in &bytes[..full] {
            node = Arc::make_mut(node.child_entry(byte));
        }

        if rem > 0 {
            node.has_partial_mask_child = true;
            let key = bytes[full] & byte_mask(rem);
            node = Arc::make_mut(node.child_entry(key));
        }

        let added = node.mark_terminal(block.prefix_len(), start, end);
        if added {
            self.len += 1;
        }
        added
    }

    /// Whether exactly this block is stored.
    pub fn contains_block(&self, block: &CidrBlock) -> bool {
        let path = trie_path(block);
        let mut node = self.root(block.family());
        for &byte in &path {
            match node.child(byte) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.prefix_mask & prefix_bit(block.prefix_len()) != 0
    }

    /// Remove exactly this block, pruning nodes left without purpose.
    ///
    /// Fails with [`Error::EntryNotFound`] and leaves the trie untouched if
    /// the block is not stored.
    pub fn remove(&mut self, block: &CidrBlock) -> Result<()> {
        if !self.contains_block(block) {
            return Err(Error::EntryNotFound(block.to_string()));
        }

        let path = trie_path(block);
        let root = self.root_mut(block.family());
        remove_along(root, &path, block.prefix_len(), 0);
        self.len -= 1;
        Ok(())
    }

    /// Whether `addr` falls inside any stored block of its family.
    pub fn contains(&self, addr: &CanonicalAddr) -> bool {
        let mut node = self.root(addr.family());

        for &byte in addr.as_bytes() {
            if node.is_terminal() {
                return true;
            }
            if node.has_partial_mask_child && node.child_range_covers(addr) {
                return true;
            }
            match node.child(byte) {
                Some(child) => node = child,
                None => return false,
            }
        }

        node.is_terminal()
    }
}

/// Child keys from the family root to the node where `block` terminates.
fn trie_path(block: &CidrBlock) -> Vec<u8> {
    let start = block.network_start();
    let bytes = start.as_bytes();
    let full = block.full_bytes();
    let rem = block.remainder_bits();

    let mut path = bytes[..full].to_vec();
    if rem > 0 {
        path.push(bytes[full] & byte_mask(rem));
    }
    path
}

/// Clear `prefix_len` at the end of `path`, then unlink emptied nodes on the
/// way back up. Returns whether `node` itself is now prunable.
fn remove_along(node: &mut TrieNode, path: &[u8], prefix_len: u8, depth: usize) -> bool {
    match path.split_first() {
        None => {
            node.unmark_terminal(prefix_len, depth);
        }
        Some((&byte, rest)) => {
            let prune = node
                .children
                .as_mut()
                .and_then(|c| c.get_mut(&byte))
                .map(|child| remove_along(Arc::make_mut(child), rest, prefix_len, depth + 1))
                .unwrap_or(false);
            if prune {
                node.remove_child(byte);
            }
            node.refresh_partial_flag();
        }
    }
    node.is_prunable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    fn block(s: &str) -> CidrBlock {
        CidrBlock::parse(s).unwrap()
    }

    fn check(trie: &Trie, s: &str) -> bool {
        trie.contains(&Address::from(s).normalize().unwrap())
    }

    #[test]
    fn test_insert_and_check_ipv4() {
        let mut trie = Trie::new();
        trie.insert(&block("192.168.1.0/24"));

        assert!(check(&trie, "192.168.1.1"));
        assert!(check(&trie, "192.168.1.255"));
        assert!(!check(&trie, "192.168.2.1"));
        assert!(!check(&trie, "10.0.0.1"));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_insert_and_check_ipv6() {
        let mut trie = Trie::new();
        trie.insert(&block("2001:db8::/32"));

        assert!(check(&trie, "2001:db8::1"));
        assert!(check(&trie, "2001:db8:ffff:ffff:ffff:ffff:ffff:ffff"));
        assert!(!check(&trie, "2001:db9::1"));
        assert!(!check(&trie, "2001:db7::1"));
    }

    #[test]
    fn test_partial_mask_boundaries() {
        let mut trie = Trie::new();
        trie.insert(&block("172.16.0.0/12"));

        assert!(check(&trie, "172.16.0.1"));
        assert!(check(&trie, "172.17.0.5"));
        assert!(check(&trie, "172.31.255.255"));
        assert!(!check(&trie, "172.32.0.1"));
        assert!(!check(&trie, "172.15.255.255"));
    }

    #[test]
    fn test_partial_mask_ipv6() {
        let mut trie = Trie::new();
        trie.insert(&block("fc00::/7"));
        trie.insert(&block("fe80::/10"));

        assert!(check(&trie, "fc00::1"));
        assert!(check(&trie, "fd12:3456::1"));
        assert!(check(&trie, "febf::1"));
        assert!(!check(&trie, "fec0::1"));
        assert!(!check(&trie, "fb00::1"));
    }

    #[test]
    fn test_partial_mask_in_last_byte() {
        let mut trie = Trie::new();
        trie.insert(&block("192.0.2.64/26"));

        assert!(check(&trie, "192.0.2.64"));
        assert!(check(&trie, "192.0.2.127"));
        assert!(!check(&trie, "192.0.2.63"));
        assert!(!check(&trie, "192.0.2.128"));
    }

    #[test]
    fn test_family_isolation() {
        let mut trie = Trie::new();
        trie.insert(&block("0.0.0.0/0"));

        assert!(check(&trie, "203.0.113.9"));
        assert!(!check(&trie, "2001:db8::1"));

        trie.insert(&block("::/0"));
        assert!(check(&trie, "2001:db8::1"));
    }

    #[test]
    fn test_host_routes() {
        let mut trie = Trie::new();
        trie.insert(&block("192.168.1.100/32"));
        trie.insert(&block("2001:db8::1/128"));

        assert!(check(&trie, "192.168.1.100"));
        assert!(!check(&trie, "192.168.1.101"));
        assert!(check(&trie, "2001:db8::1"));
        assert!(!check(&trie, "2001:db8::2"));
    }

    #[test]
    fn test_duplicate_insert_is_idempotent() {
        let mut trie = Trie::new();
        assert!(trie.insert(&block("10.0.0.0/8")));
        assert!(!trie.insert(&block("10.1.2.3/8")));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_remove_prunes_path() {
        let mut trie = Trie::new();
        trie.insert(&block("10.0.0.0/8"));
        assert!(check(&trie, "10.1.2.3"));

        trie.remove(&block("10.0.0.0/8")).unwrap();
        assert!(!check(&trie, "10.1.2.3"));
        assert_eq!(trie.root(Family::V4).child_count(), 0);
        assert!(trie.is_empty());

        let err = trie.remove(&block("10.0.0.0/8")).unwrap_err();
        assert!(matches!(err, Error::EntryNotFound(_)));
    }

    #[test]
    fn test_remove_keeps_overlapping_entries() {
        let mut trie = Trie::new();
        trie.insert(&block("10.0.0.0/8"));
        trie.insert(&block("10.10.0.0/16"));

        trie.remove(&block("10.0.0.0/8")).unwrap();
        assert!(!check(&trie, "10.5.5.5"));
        assert!(check(&trie, "10.10.5.5"));
    }

    #[test]
    fn test_colocated_partial_and_full_prefixes() {
        let mut trie = Trie::new();
        trie.insert(&block("10.0.0.0/12"));
        trie.insert(&block("10.0.0.0/16"));

        assert!(check(&trie, "10.5.0.1"));
        assert!(check(&trie, "10.0.200.1"));

        // Removing the narrower block leaves the wider one intact.
        trie.remove(&block("10.0.0.0/16")).unwrap();
        assert!(check(&trie, "10.5.0.1"));

        trie.insert(&block("10.0.0.0/16"));
        trie.remove(&block("10.0.0.0/12")).unwrap();
        assert!(!check(&trie, "10.5.0.1"));
        assert!(check(&trie, "10.0.200.1"));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_remove_requires_exact_prefix() {
        let mut trie = Trie::new();
        trie.insert(&block("10.0.0.0/12"));

        assert!(trie.remove(&block("10.0.0.0/16")).is_err());
        assert!(trie.remove(&block("10.0.0.0/13")).is_err());
        assert!(trie.remove(&block("11.0.0.0/8")).is_err());
        assert!(check(&trie, "10.9.0.1"));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_partial_flag_cleared_after_remove() {
        let mut trie = Trie::new();
        trie.insert(&block("172.16.0.0/12"));
        assert!(trie.root(Family::V4).child(172).unwrap().has_partial_mask_child());

        trie.insert(&block("172.16.5.0/24"));
        trie.remove(&block("172.16.0.0/12")).unwrap();

        let parent = trie.root(Family::V4).child(172).unwrap();
        assert!(!parent.has_partial_mask_child());
        assert!(check(&trie, "172.16.5.9"));
        assert!(!check(&trie, "172.17.0.1"));
    }

    #[test]
    fn test_clone_is_isolated_from_writes() {
        let mut trie = Trie::new();
        trie.insert(&block("10.0.0.0/8"));

        let snapshot = trie.clone();
        trie.insert(&block("192.168.0.0/16"));
        trie.remove(&block("10.0.0.0/8")).unwrap();

        assert!(check(&snapshot, "10.0.0.1"));
        assert!(!check(&snapshot, "192.168.0.1"));
        assert!(!check(&trie, "10.0.0.1"));
        assert!(check(&trie, "192.168.0.1"));
    }

    #[test]
    fn test_containment_exhaustive_for_short_prefixes() {
        for prefix in 1..=16u8 {
            let mut trie = Trie::new();
            let cidr = block(&format!("100.64.0.0/{}", prefix));
            trie.insert(&cidr);

            for hi in 0..=255u8 {
                let addr = CanonicalAddr::V4([hi, 64, 1, 1]);
                assert_eq!(trie.contains(&addr), cidr.contains(&addr), "{} {}", cidr, addr);
            }
        }
    }
}
