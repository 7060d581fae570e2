//! Cache configuration types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Default cache capacity (number of entries per cache).
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// How lookups are cached in front of the trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CacheStrategy {
    /// Normalize and walk the trie on every call
    None = 0,
    /// Cache keyed by the input exactly as given; normalize only on a miss
    Simple = 1,
    /// Normalize first, cache keyed by the canonical bytes
    #[default]
    Normalized = 2,
    /// Separate caches for input conversion and for lookup results
    Dual = 3,
}

impl CacheStrategy {
    /// All strategies, in wire order.
    pub const ALL: [CacheStrategy; 4] = [
        CacheStrategy::None,
        CacheStrategy::Simple,
        CacheStrategy::Normalized,
        CacheStrategy::Dual,
    ];

    /// Get the configuration name of this strategy.
    pub fn name(&self) -> &'static str {
        match self {
            CacheStrategy::None => "none",
            CacheStrategy::Simple => "simple",
            CacheStrategy::Normalized => "normalized",
            CacheStrategy::Dual => "dual",
        }
    }

    /// Convert from a u8 value.
    ///
    /// Returns `None` for invalid values.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CacheStrategy::None),
            1 => Some(CacheStrategy::Simple),
            2 => Some(CacheStrategy::Normalized),
            3 => Some(CacheStrategy::Dual),
            _ => None,
        }
    }

    /// Convert to a u8 value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CacheStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(CacheStrategy::None),
            "simple" => Ok(CacheStrategy::Simple),
            "normalized" => Ok(CacheStrategy::Normalized),
            "dual" => Ok(CacheStrategy::Dual),
            _ => Err(Error::InvalidConfiguration(format!(
                "unknown cache strategy: {}",
                s
            ))),
        }
    }
}

/// Configuration for the lookup caches.
///
/// # Examples
/// ```
/// use cidrtrie::{CacheConfig, CacheStrategy};
///
/// let config = CacheConfig::new("dual", 1024).unwrap();
/// assert_eq!(config.strategy, CacheStrategy::Dual);
///
/// assert!(CacheConfig::new("lru", 1024).is_err());
/// assert!(CacheConfig::new("simple", -1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Caching strategy.
    pub strategy: CacheStrategy,
    /// Maximum number of entries in each cache; 0 disables caching.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: CacheStrategy::default(),
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Validate a strategy name and a signed capacity.
    pub fn new(strategy: &str, capacity: i64) -> Result<Self> {
        let strategy = strategy.parse()?;
        let capacity = usize::try_from(capacity).map_err(|_| {
            Error::InvalidConfiguration(format!("capacity must be non-negative: {}", capacity))
        })?;
        Ok(Self { strategy, capacity })
    }

    /// Default capacity with the given strategy.
    pub fn with_strategy(strategy: CacheStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Default strategy with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Create a configuration with caching disabled.
    pub fn no_cache() -> Self {
        Self {
            strategy: CacheStrategy::None,
            capacity: 0,
        }
    }

    /// Whether any cache will actually be allocated.
    pub fn is_enabled(&self) -> bool {
        self.strategy != CacheStrategy::None && self.capacity > 0
    }

    /// Parse from YAML; omitted fields use the defaults.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).map_err(|e| Error::InvalidConfiguration(e.to_string()))
    }

    /// Parse from JSON; omitted fields use the defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::InvalidConfiguration(e.to_string()))
    }
}
