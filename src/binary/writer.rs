//! Binary trie dump writer.

use super::format::*;
use crate::address::Family;
use crate::cache::CacheConfig;
use crate::trie::{Trie, TrieNode};

/// Serializes a trie and its cache configuration.
pub struct BinaryTrieWriter {
    buffer: Vec<u8>,
    compress: bool,
}

impl BinaryTrieWriter {
    /// Create a new writer.
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64 * 1024),
            compress: false,
        }
    }

    /// Create a writer that LZ4-compresses the body.
    #[cfg(feature = "compression")]
    pub fn compressed() -> Self {
        Self {
            compress: true,
            ..Self::new()
        }
    }

    /// Write `trie` and `config` to the binary format.
    pub fn write(&mut self, trie: &Trie, config: &CacheConfig) -> Vec<u8> {
        self.buffer.clear();
        self.buffer.resize(HEADER_SIZE, 0);

        write_node(&mut self.buffer, trie.root(Family::V4));
        write_node(&mut self.buffer, trie.root(Family::V6));

        let flags = if self.compress {
            self.compress_body();
            FormatFlags::COMPRESSED
        } else {
            FormatFlags::empty()
        };

        let header = DumpHeader {
            magic: MAGIC,
            version: FORMAT_VERSION,
            flags: flags.bits(),
            strategy: config.strategy.as_u8(),
            capacity: config.capacity as u64,
            entry_count: trie.len() as u64,
            checksum: body_checksum(&self.buffer[HEADER_SIZE..]),
        };
        self.buffer[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        std::mem::take(&mut self.buffer)
    }

    #[cfg(feature = "compression")]
    fn compress_body(&mut self) {
        let compressed = lz4_flex::compress_prepend_size(&self.buffer[HEADER_SIZE..]);
        self.buffer.truncate(HEADER_SIZE);
        self.buffer.extend_from_slice(&compressed);
    }

    #[cfg(not(feature = "compression"))]
    fn compress_body(&mut self) {}
}

impl Default for BinaryTrieWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-order node record:
/// `mask u8 | [start, end] if mask != 0 | count u16 | (key u8, record)*`.
fn write_node(buf: &mut Vec<u8>, node: &TrieNode) {
    buf.push(node.prefix_mask);
    if let Some(range) = node.range() {
        buf.extend_from_slice(range.start.as_bytes());
        buf.extend_from_slice(range.end.as_bytes());
    }

    buf.extend_from_slice(&(node.child_count() as u16).to_le_bytes());
    for (key, child) in node.children() {
        buf.push(key);
        write_node(buf, child);
    }
}
