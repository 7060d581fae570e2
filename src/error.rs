//! Error types for cidrtrie.

use thiserror::Error;

/// Error type for cidrtrie operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or wrong-length address
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed CIDR text or prefix length wider than the address family
    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),

    /// Removal target is not currently inserted
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// Unknown cache strategy, negative capacity or unparsable config file
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Truncated or structurally inconsistent serialized data
    #[error("serialization error: {0}")]
    Serialization(#[from] FormatError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for cidrtrie operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the binary dump format.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Invalid magic bytes
    #[error("invalid magic bytes: expected CIDRTRIE header")]
    InvalidMagic,

    /// Unsupported binary format version
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Input ended before a complete structure was read
    #[error("truncated data: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Input is complete but violates a structural rule
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// Compressed body could not be decompressed
    #[cfg(feature = "compression")]
    #[error("decompression failed: {0}")]
    Decompress(String),
}

impl Error {
    /// Whether this error came from decoding a dump.
    pub fn is_serialization(&self) -> bool {
        matches!(self, Error::Serialization(_))
    }
}
