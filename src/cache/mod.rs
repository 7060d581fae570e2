//! Lookup caching in front of the trie.
//!
//! The strategy is chosen once at construction and held as a tagged
//! variant. Cached results carry the generation of the trie snapshot they
//! were computed from, so a result computed against a replaced snapshot is
//! never served, even if it was stored after the cache was cleared.

mod config;
mod lru;

pub use config::{CacheConfig, CacheStrategy, DEFAULT_CACHE_CAPACITY};
pub use lru::CacheStats;

use serde::Serialize;

use crate::address::{Address, CanonicalAddr, RawAddress};
use crate::trie::Trie;
use crate::Result;
use lru::CountingCache;

/// A lookup result and the snapshot generation it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stamped {
    generation: u64,
    matched: bool,
}

type LookupCache<K> = CountingCache<K, Stamped>;

/// Cache statistics as reported by [`crate::CidrMatcher::get_cache_info`].
///
/// `current_size`, `hits` and `misses` describe the result cache. The dual
/// strategy additionally reports its conversion cache separately.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheInfo {
    /// Active strategy.
    pub strategy: CacheStrategy,
    /// Configured capacity per cache.
    pub capacity: usize,
    /// Entries in the result cache.
    pub current_size: usize,
    /// Result cache hits.
    pub hits: u64,
    /// Result cache misses.
    pub misses: u64,
    /// Raw input to canonical bytes cache (dual only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion: Option<CacheStats>,
}

impl CacheInfo {
    /// Result cache statistics.
    pub fn lookup(&self) -> CacheStats {
        CacheStats {
            capacity: self.capacity,
            current_size: self.current_size,
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Render as JSON, e.g. for a stats endpoint or log line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Strategy-specific cache state.
pub(crate) enum CacheManager {
    None,
    Simple(Option<LookupCache<RawAddress>>),
    Normalized(Option<LookupCache<CanonicalAddr>>),
    Dual {
        conversion: Option<CountingCache<RawAddress, CanonicalAddr>>,
        lookup: Option<LookupCache<CanonicalAddr>>,
    },
}

impl CacheManager {
    pub(crate) fn new(config: &CacheConfig) -> Self {
        let capacity = config.capacity;
        match config.strategy {
            CacheStrategy::None => CacheManager::None,
            CacheStrategy::Simple => CacheManager::Simple(CountingCache::new(capacity)),
            CacheStrategy::Normalized => CacheManager::Normalized(CountingCache::new(capacity)),
            CacheStrategy::Dual => CacheManager::Dual {
                conversion: CountingCache::new(capacity),
                lookup: CountingCache::new(capacity),
            },
        }
    }

    /// Answer a membership query against `trie`, published as `generation`.
    pub(crate) fn check(&self, address: Address<'_>, trie: &Trie, generation: u64) -> Result<bool> {
        match self {
            CacheManager::None => Ok(trie.contains(&address.normalize()?)),

            CacheManager::Simple(cache) => match cache {
                Some(cache) => {
                    let key = address.to_raw();
                    if let Some(hit) = lookup(cache, &key, generation) {
                        return Ok(hit);
                    }
                    let matched = trie.contains(&address.normalize()?);
                    store(cache, key, generation, matched);
                    Ok(matched)
                }
                None => Ok(trie.contains(&address.normalize()?)),
            },

            CacheManager::Normalized(cache) => {
                let addr = address.normalize()?;
                Ok(check_canonical(cache.as_ref(), addr, trie, generation))
            }

            CacheManager::Dual { conversion, lookup } => {
                let addr = match conversion {
                    Some(conversion) => {
                        let key = address.to_raw();
                        match conversion.get(&key) {
                            Some(addr) => addr,
                            None => {
                                let addr = address.normalize()?;
                                conversion.insert(key, addr);
                                addr
                            }
                        }
                    }
                    None => address.normalize()?,
                };
                Ok(check_canonical(lookup.as_ref(), addr, trie, generation))
            }
        }
    }

    /// Empty every cache and reset its counters.
    pub(crate) fn clear(&self) {
        match self {
            CacheManager::None => {}
            CacheManager::Simple(cache) => clear(cache.as_ref()),
            CacheManager::Normalized(cache) => clear(cache.as_ref()),
            CacheManager::Dual { conversion, lookup } => {
                clear(conversion.as_ref());
                clear(lookup.as_ref());
            }
        }
    }

    pub(crate) fn info(&self, config: &CacheConfig) -> CacheInfo {
        let (lookup, conversion) = match self {
            CacheManager::None => (None, None),
            CacheManager::Simple(cache) => (cache.as_ref().map(|c| c.stats()), None),
            CacheManager::Normalized(cache) => (cache.as_ref().map(|c| c.stats()), None),
            CacheManager::Dual { conversion, lookup } => (
                lookup.as_ref().map(|c| c.stats()),
                Some(conversion.as_ref().map(|c| c.stats()).unwrap_or_default()),
            ),
        };
        let lookup = lookup.unwrap_or_default();

        CacheInfo {
            strategy: config.strategy,
            capacity: config.capacity,
            current_size: lookup.current_size,
            hits: lookup.hits,
            misses: lookup.misses,
            conversion,
        }
    }
}

fn lookup<K>(cache: &LookupCache<K>, key: &K, generation: u64) -> Option<bool>
where
    K: Eq + std::hash::Hash + Clone,
{
    cache
        .get_valid(key, |s| s.generation == generation)
        .map(|s| s.matched)
}

fn store<K>(cache: &LookupCache<K>, key: K, generation: u64, matched: bool)
where
    K: Eq + std::hash::Hash + Clone,
{
    cache.insert(
        key,
        Stamped {
            generation,
            matched,
        },
    );
}

fn check_canonical(
    cache: Option<&LookupCache<CanonicalAddr>>,
    addr: CanonicalAddr,
    trie: &Trie,
    generation: u64,
) -> bool {
    let Some(cache) = cache else {
        return trie.contains(&addr);
    };

    if let Some(hit) = lookup(cache, &addr, generation) {
        return hit;
    }
    let matched = trie.contains(&addr);
    store(cache, addr, generation, matched);
    matched
}

fn clear<K: Eq + std::hash::Hash + Clone, V: Clone>(cache: Option<&CountingCache<K, V>>) {
    if let Some(cache) = cache {
        cache.clear();
    }
}
