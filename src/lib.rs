//! CIDRTrie - A concurrent CIDR membership set for IPv4 and IPv6.
//!
//! This crate answers "is this address inside any stored network?" with a
//! byte-indexed prefix trie, optional lookup caching and a compact binary
//! dump format.
//!
//! # Features
//!
//! - **Mid-byte prefixes**: `/12`, `/26` or `/7` blocks match their whole
//!   range, not just the masked byte
//! - **Family isolation**: IPv4 and IPv6 entries live in separate partitions
//! - **Lock-free lookups**: readers use an atomically published snapshot
//! - **Four cache strategies**: `none`, `simple`, `normalized` and `dual`
//! - **Binary dump format**: checksummed, strictly validated, memory-mapped
//!   on open
//!
//! # Quick Start
//!
//! ```
//! use cidrtrie::{CacheConfig, CacheStrategy, CidrMatcher};
//! use std::net::Ipv4Addr;
//!
//! let matcher = CidrMatcher::new(CacheConfig::with_strategy(CacheStrategy::Dual));
//! matcher.batch_insert(["10.0.0.0/8", "172.16.0.0/12", "fc00::/7"])?;
//!
//! assert!(matcher.check("172.20.1.1")?);
//! assert!(matcher.check(Ipv4Addr::new(10, 1, 2, 3))?);
//! assert!(matcher.check(&[172u8, 31, 255, 255])?);
//! assert!(!matcher.check(0xC0A8_0001u32)?);
//!
//! let restored = CidrMatcher::load(&matcher.dump())?;
//! assert!(restored.check("fd00::1")?);
//! # Ok::<(), cidrtrie::Error>(())
//! ```
//!
//! # Cache Strategies
//!
//! - **none**: normalize and walk the trie on every call
//! - **simple**: cache keyed by the input as given
//! - **normalized**: cache keyed by canonical address bytes, shared by
//!   every representation of an address
//! - **dual**: a conversion cache in front of a canonical result cache
//!
//! Every structural mutation empties the caches and resets their counters.

mod address;
mod cidr;
mod error;
mod matcher;

pub mod binary;
pub mod cache;
pub mod trie;

// Re-export core types
pub use address::{Address, CanonicalAddr, Family};
pub use cidr::CidrBlock;
pub use error::{Error, FormatError, Result};
pub use matcher::CidrMatcher;

// Re-export cache types
pub use cache::{CacheConfig, CacheInfo, CacheStats, CacheStrategy, DEFAULT_CACHE_CAPACITY};

pub use trie::Trie;
