//! Binary trie dump reader with strict structural validation.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::format::*;
use crate::address::{CanonicalAddr, Family};
use crate::cache::{CacheConfig, CacheStrategy};
use crate::cidr::fill_host_bits;
use crate::error::FormatError;
use crate::trie::{widest_prefix, NetworkRange, Trie, TrieNode};

/// Decoded dump: header, trie and cache configuration.
#[derive(Debug)]
pub struct BinaryTrieReader {
    header: DumpHeader,
    trie: Trie,
    config: CacheConfig,
}

impl BinaryTrieReader {
    /// Decode and validate a dump.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        let header = DumpHeader::from_bytes(data)?;
        header.validate()?;

        let stored = &data[HEADER_SIZE..];
        if body_checksum(stored) != header.checksum {
            return Err(FormatError::ChecksumMismatch);
        }

        let strategy = CacheStrategy::from_u8(header.strategy).ok_or_else(|| {
            FormatError::Corrupt(format!("unknown cache strategy tag: {}", header.strategy))
        })?;
        let capacity = usize::try_from(header.capacity).map_err(|_| {
            FormatError::Corrupt(format!("capacity out of range: {}", header.capacity))
        })?;

        let body = decompress(&header, stored)?;
        let mut cursor = Cursor::new(&body);
        let mut entries = 0usize;
        let v4 = read_node(&mut cursor, Family::V4, &mut Vec::new(), &mut entries)?;
        let v6 = read_node(&mut cursor, Family::V6, &mut Vec::new(), &mut entries)?;

        if cursor.remaining() != 0 {
            return Err(FormatError::Corrupt(format!(
                "{} trailing bytes after trie body",
                cursor.remaining()
            )));
        }
        if entries as u64 != header.entry_count {
            return Err(FormatError::Corrupt(format!(
                "entry count mismatch: header says {}, body holds {}",
                header.entry_count, entries
            )));
        }

        Ok(Self {
            header,
            trie: Trie::from_parts(v4, v6, entries),
            config: CacheConfig { strategy, capacity },
        })
    }

    /// Get the dump header.
    pub fn header(&self) -> &DumpHeader {
        &self.header
    }

    /// Restored cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Restored trie.
    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    /// Take the trie and configuration.
    pub fn into_parts(self) -> (Trie, CacheConfig) {
        (self.trie, self.config)
    }
}

#[cfg(feature = "compression")]
fn decompress<'a>(
    header: &DumpHeader,
    stored: &'a [u8],
) -> Result<std::borrow::Cow<'a, [u8]>, FormatError> {
    if header.format_flags().contains(FormatFlags::COMPRESSED) {
        lz4_flex::decompress_size_prepended(stored)
            .map(std::borrow::Cow::Owned)
            .map_err(|e| FormatError::Decompress(e.to_string()))
    } else {
        Ok(std::borrow::Cow::Borrowed(stored))
    }
}

#[cfg(not(feature = "compression"))]
fn decompress<'a>(
    header: &DumpHeader,
    stored: &'a [u8],
) -> Result<std::borrow::Cow<'a, [u8]>, FormatError> {
    if header.format_flags().contains(FormatFlags::COMPRESSED) {
        return Err(FormatError::Corrupt(
            "compressed dump requires the `compression` feature".to_string(),
        ));
    }
    Ok(std::borrow::Cow::Borrowed(stored))
}

/// Bounds-checked reader over the body.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if self.remaining() < n {
            return Err(FormatError::Truncated {
                expected: HEADER_SIZE + self.pos + n,
                actual: HEADER_SIZE + self.data.len(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, FormatError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn addr(&mut self, family: Family) -> Result<CanonicalAddr, FormatError> {
        let bytes = self.take(family.byte_len())?;
        CanonicalAddr::from_slice(bytes).map_err(|e| FormatError::Corrupt(e.to_string()))
    }
}

/// Read one node record at depth `path.len()`, validating it against the
/// path of child keys that leads to it.
fn read_node(
    cursor: &mut Cursor<'_>,
    family: Family,
    path: &mut Vec<u8>,
    entries: &mut usize,
) -> Result<TrieNode, FormatError> {
    let depth = path.len();
    let mut node = TrieNode::default();

    node.prefix_mask = cursor.u8()?;
    if node.prefix_mask != 0 {
        if depth == 0 && node.prefix_mask != crate::trie::prefix_bit(0) {
            return Err(FormatError::Corrupt(format!(
                "family root carries prefix mask {:#04x}",
                node.prefix_mask
            )));
        }

        let start = cursor.addr(family)?;
        let end = cursor.addr(family)?;
        validate_range(path, node.prefix_mask, &start, &end)?;

        node.range = Some(NetworkRange { start, end });
        *entries += node.prefix_mask.count_ones() as usize;
    }

    let count = cursor.u16()? as usize;
    if count > MAX_CHILDREN {
        return Err(FormatError::Corrupt(format!("{} children in one node", count)));
    }
    if count > 0 && depth >= family.byte_len() {
        return Err(FormatError::Corrupt(format!(
            "children below full address depth {}",
            depth
        )));
    }

    if count > 0 {
        let mut children = BTreeMap::new();
        let mut previous: Option<u8> = None;

        for _ in 0..count {
            let key = cursor.u8()?;
            if previous.is_some_and(|p| key <= p) {
                return Err(FormatError::Corrupt(format!(
                    "child keys not strictly ascending at depth {}",
                    depth
                )));
            }
            previous = Some(key);

            path.push(key);
            let child = read_node(cursor, family, path, entries)?;
            path.pop();

            if child.is_prunable() {
                return Err(FormatError::Corrupt(format!(
                    "empty non-terminal node at depth {}",
                    depth + 1
                )));
            }
            children.insert(key, Arc::new(child));
        }

        node.children = Some(children);
        node.refresh_partial_flag();
    }

    Ok(node)
}

/// A terminal node's range must be the one its position and widest prefix
/// imply.
fn validate_range(
    path: &[u8],
    mask: u8,
    start: &CanonicalAddr,
    end: &CanonicalAddr,
) -> Result<(), FormatError> {
    let widest = widest_prefix(mask, path.len());

    let mut expected_start = *start;
    fill_host_bits(&mut expected_start, widest, false);
    let mut expected_end = *start;
    fill_host_bits(&mut expected_end, widest, true);

    let bytes = start.as_bytes();
    let path_matches = bytes[..path.len()] == *path && bytes[path.len()..].iter().all(|b| *b == 0);

    if !path_matches || expected_start != *start || expected_end != *end {
        return Err(FormatError::Corrupt(format!(
            "range {}-{} inconsistent with node position",
            start, end
        )));
    }
    Ok(())
}
