//! Compact binary form of a trie and its cache configuration.
//!
//! # File Structure
//!
//! ```text
//! +------------------+
//! |     HEADER       |  56 bytes (fixed)
//! +------------------+
//! |   IPv4 RECORDS   |  pre-order node records from the IPv4 root
//! +------------------+
//! |   IPv6 RECORDS   |  pre-order node records from the IPv6 root
//! +------------------+
//! ```
//!
//! The body (everything after the header) may be LZ4 compressed when the
//! `compression` feature is enabled. There is no cross-version
//! compatibility: a reader accepts only its own exact layout.

mod format;
mod reader;
mod writer;


pub use format::*;
pub use reader::BinaryTrieReader;
pub use writer::BinaryTrieWriter;
