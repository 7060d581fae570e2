//! Binary format constants and header.

use bitflags::bitflags;

use crate::error::FormatError;

/// Magic bytes for identifying trie dumps.
pub const MAGIC: [u8; 8] = *b"CIDRTRIE";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 56;

/// Bytes of the SHA-256 body digest kept in the header.
pub const CHECKSUM_SIZE: usize = 16;

/// Upper bound on children per node (one per byte value).
pub const MAX_CHILDREN: usize = 256;

bitflags! {
    /// Format flags for dumps.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormatFlags: u32 {
        /// Body is LZ4 compressed.
        const COMPRESSED = 0b00000001;
    }
}

/// Dump header (56 bytes, little-endian).
///
/// ```text
/// 0x00  magic         [u8; 8]
/// 0x08  version       u32
/// 0x0C  flags         u32
/// 0x10  strategy      u8
/// 0x11  reserved      [u8; 7]
/// 0x18  capacity      u64
/// 0x20  entry_count   u64
/// 0x28  checksum      [u8; 16]   SHA-256 of the stored body, truncated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpHeader {
    /// Magic bytes: "CIDRTRIE"
    pub magic: [u8; 8],
    /// Format version
    pub version: u32,
    /// Format flags
    pub flags: u32,
    /// Cache strategy tag
    pub strategy: u8,
    /// Cache capacity
    pub capacity: u64,
    /// Number of stored CIDR blocks
    pub entry_count: u64,
    /// Truncated SHA-256 of the body
    pub checksum: [u8; CHECKSUM_SIZE],
}

impl DumpHeader {
    /// Create a new header with default values.
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            flags: 0,
            strategy: 0,
            capacity: 0,
            entry_count: 0,
            checksum: [0; CHECKSUM_SIZE],
        }
    }

    /// Encode to the fixed-size wire layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0x00..0x08].copy_from_slice(&self.magic);
        out[0x08..0x0C].copy_from_slice(&self.version.to_le_bytes());
        out[0x0C..0x10].copy_from_slice(&self.flags.to_le_bytes());
        out[0x10] = self.strategy;
        out[0x18..0x20].copy_from_slice(&self.capacity.to_le_bytes());
        out[0x20..0x28].copy_from_slice(&self.entry_count.to_le_bytes());
        out[0x28..0x38].copy_from_slice(&self.checksum);
        out
    }

    /// Decode from the start of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < HEADER_SIZE {
            return Err(FormatError::Truncated {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let u32_at = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&data[at..at + 4]);
            u32::from_le_bytes(b)
        };
        let u64_at = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&data[at..at + 8]);
            u64::from_le_bytes(b)
        };

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&data[0x00..0x08]);
        let mut checksum = [0u8; CHECKSUM_SIZE];
        checksum.copy_from_slice(&data[0x28..0x38]);

        Ok(Self {
            magic,
            version: u32_at(0x08),
            flags: u32_at(0x0C),
            strategy: data[0x10],
            capacity: u64_at(0x18),
            entry_count: u64_at(0x20),
            checksum,
        })
    }

    /// Validate the header magic, version and flags.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.magic != MAGIC {
            return Err(FormatError::InvalidMagic);
        }
        if self.version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(self.version));
        }
        if FormatFlags::from_bits(self.flags).is_none() {
            return Err(FormatError::Corrupt(format!(
                "unknown format flags: {:#x}",
                self.flags
            )));
        }
        Ok(())
    }

    /// Get format flags.
    pub fn format_flags(&self) -> FormatFlags {
        FormatFlags::from_bits_truncate(self.flags)
    }
}

impl Default for DumpHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncated SHA-256 digest of `body`.
pub fn body_checksum(body: &[u8]) -> [u8; CHECKSUM_SIZE] {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(body);
    let mut out = [0u8; CHECKSUM_SIZE];
    out.copy_from_slice(&digest[..CHECKSUM_SIZE]);
    out
}
