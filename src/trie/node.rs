//! Trie node with lazily allocated, copy-on-write children.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::address::CanonicalAddr;
use crate::cidr::fill_host_bits;

/// Bit recorded for a prefix that ends exactly on a byte boundary.
pub(crate) const FULL_BYTE_BIT: u8 = 0x80;

/// Bits recorded for prefixes that end mid-byte.
pub(crate) const PARTIAL_BITS: u8 = !FULL_BYTE_BIT;

/// Bit in a node's prefix mask for a prefix length.
///
/// Every prefix terminating at depth `d` lies in `8d-7..=8d` (or is `/0` at
/// the family root), so its position inside that byte identifies it.
#[inline]
pub(crate) fn prefix_bit(prefix_len: u8) -> u8 {
    1 << ((prefix_len as u32 + 7) % 8)
}

/// Prefix length for the lowest set bit of `mask` at `depth`.
#[inline]
pub(crate) fn widest_prefix(mask: u8, depth: usize) -> u8 {
    let bit = mask.trailing_zeros() as usize;
    (8 * depth + bit + 1).saturating_sub(8) as u8
}

/// First and last address of the widest CIDR terminating at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkRange {
    /// First address (network address)
    pub start: CanonicalAddr,
    /// Last address (all host bits set)
    pub end: CanonicalAddr,
}

impl NetworkRange {
    /// Whether `addr` lies in `[start, end]`.
    #[inline]
    pub fn contains(&self, addr: &CanonicalAddr) -> bool {
        self.start <= *addr && *addr <= self.end
    }
}

/// One level of the byte-indexed trie.
///
/// Children are shared through `Arc` so a writer can clone a snapshot in
/// O(1) and copy only the path it touches.
#[derive(Debug, Clone, Default)]
pub struct TrieNode {
    pub(crate) children: Option<BTreeMap<u8, Arc<TrieNode>>>,
    /// Prefix lengths terminating here, one bit per position in the byte.
    pub(crate) prefix_mask: u8,
    /// Set iff `prefix_mask != 0`.
    pub(crate) range: Option<NetworkRange>,
    pub(crate) has_partial_mask_child: bool,
}

impl TrieNode {
    /// Whether an inserted CIDR ends at this node.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.prefix_mask != 0
    }

    /// Whether a CIDR with a mid-byte prefix ends at this node.
    #[inline]
    pub fn is_partial_terminal(&self) -> bool {
        self.prefix_mask & PARTIAL_BITS != 0
    }

    /// Range of the widest CIDR ending here.
    pub fn range(&self) -> Option<&NetworkRange> {
        self.range.as_ref()
    }

    /// Whether some child holds a mid-byte CIDR needing a range scan.
    pub fn has_partial_mask_child(&self) -> bool {
        self.has_partial_mask_child
    }

    /// Child keyed by `byte`.
    #[inline]
    pub fn child(&self, byte: u8) -> Option<&TrieNode> {
        self.children.as_ref()?.get(&byte).map(|c| c.as_ref())
    }

    /// Children in ascending key order.
    pub fn children(&self) -> impl Iterator<Item = (u8, &TrieNode)> + '_ {
        self.children
            .iter()
            .flat_map(|map| map.iter().map(|(k, v)| (*k, v.as_ref())))
    }

    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.as_ref().map_or(0, |c| c.len())
    }

    /// Scan terminal children for a range covering `addr`.
    pub(crate) fn child_range_covers(&self, addr: &CanonicalAddr) -> bool {
        match self.children {
            Some(ref children) => children
                .values()
                .any(|c| c.range.is_some_and(|r| r.contains(addr))),
            None => false,
        }
    }

    /// Mutable child slot for `byte`, allocating the map and node on demand.
    pub(crate) fn child_entry(&mut self, byte: u8) -> &mut Arc<TrieNode> {
        self.children
            .get_or_insert_with(BTreeMap::new)
            .entry(byte)
            .or_default()
    }

    /// Record `prefix_len` as terminating here. Returns false if already set.
    pub(crate) fn mark_terminal(
        &mut self,
        prefix_len: u8,
        start: CanonicalAddr,
        end: CanonicalAddr,
    ) -> bool {
        let bit = prefix_bit(prefix_len);
        if self.prefix_mask & bit != 0 {
            return false;
        }

        let lowest = self.prefix_mask & self.prefix_mask.wrapping_neg();
        if self.prefix_mask == 0 || bit < lowest {
            self.range = Some(NetworkRange { start, end });
        }
        self.prefix_mask |= bit;
        true
    }

    /// Clear `prefix_len`, narrowing the range to the next widest prefix.
    pub(crate) fn unmark_terminal(&mut self, prefix_len: u8, depth: usize) -> bool {
        let bit = prefix_bit(prefix_len);
        if self.prefix_mask & bit == 0 {
            return false;
        }

        self.prefix_mask &= !bit;
        if self.prefix_mask == 0 {
            self.range = None;
        } else if let Some(ref mut range) = self.range {
            let mut end = range.start;
            fill_host_bits(&mut end, widest_prefix(self.prefix_mask, depth), true);
            range.end = end;
        }
        true
    }

    /// Recompute the partial-child flag from the current children.
    pub(crate) fn refresh_partial_flag(&mut self) {
        self.has_partial_mask_child = self
            .children
            .as_ref()
            .is_some_and(|c| c.values().any(|n| n.is_partial_terminal()));
    }

    /// Unlink `byte`, dropping the map when it empties.
    pub(crate) fn remove_child(&mut self, byte: u8) {
        if let Some(ref mut children) = self.children {
            children.remove(&byte);
            if children.is_empty() {
                self.children = None;
            }
        }
    }

    /// Neither terminal nor a parent.
    pub(crate) fn is_prunable(&self) -> bool {
        !self.is_terminal() && self.children.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_bits() {
        assert_eq!(prefix_bit(0), FULL_BYTE_BIT);
        assert_eq!(prefix_bit(8), FULL_BYTE_BIT);
        assert_eq!(prefix_bit(32), FULL_BYTE_BIT);
        assert_eq!(prefix_bit(1), 0x01);
        assert_eq!(prefix_bit(12), 0x08);
        assert_eq!(prefix_bit(127), 0x40);
    }

    #[test]
    fn test_widest_prefix() {
        assert_eq!(widest_prefix(prefix_bit(0), 0), 0);
        assert_eq!(widest_prefix(prefix_bit(4), 1), 4);
        assert_eq!(widest_prefix(prefix_bit(12) | prefix_bit(16), 2), 12);
        assert_eq!(widest_prefix(prefix_bit(128), 16), 128);
    }

    #[test]
    fn test_lazy_children() {
        let mut node = TrieNode::default();
        assert!(node.children.is_none());
        assert_eq!(node.child_count(), 0);

        node.child_entry(7);
        assert_eq!(node.child_count(), 1);
        assert!(node.child(7).is_some());

        node.remove_child(7);
        assert!(node.children.is_none());
        assert!(node.is_prunable());
    }

    #[test]
    fn test_colocated_prefixes_keep_widest_range() {
        let start = CanonicalAddr::V4([10, 0, 0, 0]);
        let end12 = CanonicalAddr::V4([10, 15, 255, 255]);
        let end16 = CanonicalAddr::V4([10, 0, 255, 255]);

        let mut node = TrieNode::default();
        assert!(node.mark_terminal(16, start, end16));
        assert!(node.mark_terminal(12, start, end12));
        assert!(!node.mark_terminal(12, start, end12));
        assert_eq!(node.range().unwrap().end, end12);

        assert!(node.unmark_terminal(12, 2));
        assert!(node.is_terminal());
        assert_eq!(node.range().unwrap().end, end16);

        assert!(!node.unmark_terminal(12, 2));
        assert!(node.unmark_terminal(16, 2));
        assert!(node.range().is_none());
    }

    #[test]
    fn test_partial_flag_refresh() {
        let mut parent = TrieNode::default();
        let child = Arc::make_mut(parent.child_entry(16));
        child.mark_terminal(
            12,
            CanonicalAddr::V4([172, 16, 0, 0]),
            CanonicalAddr::V4([172, 31, 255, 255]),
        );
        parent.refresh_partial_flag();
        assert!(parent.has_partial_mask_child());

        Arc::make_mut(parent.child_entry(16)).unmark_terminal(12, 2);
        parent.refresh_partial_flag();
        assert!(!parent.has_partial_mask_child());
    }
}
