//! Thread-safe CIDR matcher with hot-swapped trie snapshots.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use memmap2::Mmap;
use parking_lot::Mutex;

use crate::address::Address;
use crate::binary::{BinaryTrieReader, BinaryTrieWriter};
use crate::cache::{CacheConfig, CacheInfo, CacheManager};
use crate::cidr::CidrBlock;
use crate::trie::Trie;
use crate::{Error, Result};

/// A published trie version.
struct Snapshot {
    trie: Trie,
    generation: u64,
}

/// CIDR membership set shared between threads.
///
/// Lookups read the current snapshot without locking. Mutations are
/// serialized by a single write lock, build the next trie version by
/// copying only the touched path, and publish it atomically. Every
/// published mutation clears the lookup caches.
///
/// # Example
///
/// ```
/// use cidrtrie::{CacheConfig, CidrMatcher};
///
/// let matcher = CidrMatcher::new(CacheConfig::default());
/// matcher.insert("172.16.0.0/12")?;
///
/// assert!(matcher.check("172.31.255.255")?);
/// assert!(!matcher.check("172.32.0.1")?);
/// # Ok::<(), cidrtrie::Error>(())
/// ```
pub struct CidrMatcher {
    /// Current trie version, replaced wholesale on mutation.
    snapshot: ArcSwap<Snapshot>,
    /// Serializes structural mutations.
    write_lock: Mutex<()>,
    cache: CacheManager,
    config: CacheConfig,
}

impl CidrMatcher {
    /// Create an empty matcher.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_trie(Trie::new(), config)
    }

    fn with_trie(trie: Trie, config: CacheConfig) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot {
                trie,
                generation: 0,
            }),
            write_lock: Mutex::new(()),
            cache: CacheManager::new(&config),
            config,
        }
    }

    /// Cache configuration chosen at construction.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of stored CIDR blocks.
    pub fn len(&self) -> usize {
        self.snapshot.load().trie.len()
    }

    /// Check if no CIDR blocks are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of mutations published so far.
    pub fn generation(&self) -> u64 {
        self.snapshot.load().generation
    }

    /// The current trie version. Later mutations do not affect it.
    pub fn snapshot(&self) -> Trie {
        self.snapshot.load().trie.clone()
    }

    /// Must be called with `write_lock` held.
    fn publish(&self, trie: Trie) {
        let generation = self.snapshot.load().generation + 1;
        self.snapshot.store(Arc::new(Snapshot { trie, generation }));
        self.cache.clear();
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Insert a CIDR block, or a bare address as a host route.
    ///
    /// Host bits are cleared. Invalid text leaves the matcher unchanged.
    pub fn insert(&self, cidr: &str) -> Result<()> {
        let block = parse_block(cidr)?;

        let _guard = self.write_lock.lock();
        let mut trie = self.snapshot();
        if trie.insert(&block) {
            log::debug!("Inserted {}", block);
        } else {
            log::debug!("{} already present", block);
        }
        self.publish(trie);
        Ok(())
    }

    /// Insert many CIDR blocks under one lock acquisition.
    ///
    /// Entries are trimmed and blank entries skipped. The first invalid
    /// entry aborts the batch: entries before it stay inserted and the
    /// error is returned. Returns the number of entries applied.
    pub fn batch_insert<I>(&self, cidrs: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.insert_all(cidrs.into_iter().map(Ok), "batch")
    }

    /// Insert CIDR blocks read line by line from `reader`.
    ///
    /// Text after `#` is a comment. Blank lines are skipped. Failure
    /// handling is the same as [`CidrMatcher::batch_insert`], and an I/O
    /// error aborts the same way.
    pub fn insert_from_reader<R: Read>(&self, reader: R) -> Result<usize> {
        let lines = BufReader::new(reader).lines().map(|line| {
            line.map_err(Error::from).map(|mut line| {
                if let Some(pos) = line.find('#') {
                    line.truncate(pos);
                }
                line
            })
        });
        self.insert_all(lines, "reader")
    }

    fn insert_all<T, I>(&self, entries: I, source: &str) -> Result<usize>
    where
        T: AsRef<str>,
        I: Iterator<Item = Result<T>>,
    {
        let _guard = self.write_lock.lock();
        let mut trie = self.snapshot();
        let mut applied = 0;
        let mut failure = None;

        for entry in entries {
            let block = entry.and_then(|entry| match entry.as_ref().trim() {
                "" => Ok(None),
                text => parse_block(text).map(Some),
            });
            match block {
                Ok(Some(block)) => {
                    trie.insert(&block);
                    applied += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if applied > 0 {
            self.publish(trie);
        }

        match failure {
            None => {
                log::info!("Inserted {} CIDR blocks from {}", applied, source);
                Ok(applied)
            }
            Some(e) => {
                log::warn!(
                    "Insert from {} aborted after {} CIDR blocks: {}",
                    source,
                    applied,
                    e
                );
                Err(e)
            }
        }
    }

    /// Remove exactly this CIDR block.
    ///
    /// Fails with [`Error::EntryNotFound`] if it was never inserted.
    pub fn remove(&self, cidr: &str) -> Result<()> {
        let block = parse_block(cidr)?;

        let _guard = self.write_lock.lock();
        let mut trie = self.snapshot();
        trie.remove(&block)?;
        self.publish(trie);

        log::debug!("Removed {}", block);
        Ok(())
    }

    /// Remove every entry and clear the caches.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.publish(Trie::new());
        log::debug!("Cleared all CIDR blocks");
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Whether `address` lies inside any stored block of its family.
    ///
    /// Accepts text, 4 or 16 raw bytes, an integer, or an IP address value.
    pub fn check<'a>(&self, address: impl Into<Address<'a>>) -> Result<bool> {
        let address = address.into();
        let snapshot = self.snapshot.load();
        let result = self
            .cache
            .check(address, &snapshot.trie, snapshot.generation);
        if let Err(e) = &result {
            log::warn!("Rejected lookup: {}", e);
        }
        result
    }

    /// Same as [`CidrMatcher::check`] but bypasses every cache.
    pub fn check_uncached<'a>(&self, address: impl Into<Address<'a>>) -> Result<bool> {
        let addr = address.into().normalize()?;
        Ok(self.snapshot.load().trie.contains(&addr))
    }

    /// Cache statistics for the configured strategy.
    pub fn get_cache_info(&self) -> CacheInfo {
        self.cache.info(&self.config)
    }

    /// Empty the caches and reset their counters. Trie contents are kept.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Encode the current trie and cache configuration.
    pub fn dump(&self) -> Vec<u8> {
        let snapshot = self.snapshot.load();
        let data = BinaryTrieWriter::new().write(&snapshot.trie, &self.config);
        log::debug!(
            "Dumped {} CIDR blocks ({} bytes)",
            snapshot.trie.len(),
            data.len()
        );
        data
    }

    /// Like [`CidrMatcher::dump`] with an LZ4 compressed body.
    #[cfg(feature = "compression")]
    pub fn dump_compressed(&self) -> Vec<u8> {
        let snapshot = self.snapshot.load();
        BinaryTrieWriter::compressed().write(&snapshot.trie, &self.config)
    }

    /// Rebuild a matcher from [`CidrMatcher::dump`] output.
    ///
    /// The restored matcher starts with empty caches.
    pub fn load(data: &[u8]) -> Result<Self> {
        let (trie, config) = BinaryTrieReader::from_bytes(data)?.into_parts();
        log::info!(
            "Loaded {} CIDR blocks (strategy {}, capacity {})",
            trie.len(),
            config.strategy,
            config.capacity
        );
        Ok(Self::with_trie(trie, config))
    }

    /// Write [`CidrMatcher::dump`] output to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.dump())?;
        log::info!("Saved CIDR trie to {:?}", path.as_ref());
        Ok(())
    }

    /// Load a dump file written by [`CidrMatcher::save`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::load(&mmap)
    }
}

impl Default for CidrMatcher {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn parse_block(text: &str) -> Result<CidrBlock> {
    CidrBlock::parse(text).map_err(|e| {
        log::warn!("Rejected CIDR {:?}: {}", text, e);
        e
    })
}
