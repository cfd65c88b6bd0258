//! Decoded pack cache
//!
//! Packs are decoded on first access and shared as `Arc`s. Decoding happens
//! outside any lock; when two callers decode the same pack concurrently, the
//! first insertion wins and the other result is discarded, so the cache only
//! ever holds one fully decoded pack per hash.
//!
//! Without a budget entries live until [`PackCache::clear`] or drop. With a
//! budget, least recently used packs are evicted once the decoded payload
//! bytes exceed it. The pack just inserted is never evicted by its own
//! insertion, so a single pack larger than the budget still resolves.
//!
//! Every insertion into or removal from the map happens while holding the
//! residency lock, so the resident byte count and the recency order always
//! describe exactly the packs in the map. Hits read the map without it.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};
use trinity_formats::resource::PackedArchive;

/// A decoded pack and its accounted size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPack {
    hash: u64,
    size: usize,
    archive: PackedArchive,
}

impl CachedPack {
    /// Wrap a decoded pack
    pub fn new(hash: u64, archive: PackedArchive) -> Self {
        Self {
            hash,
            size: archive.payload_bytes(),
            archive,
        }
    }

    /// Pack-name hash
    pub const fn hash(&self) -> u64 {
        self.hash
    }

    /// Bytes charged against the cache budget
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The decoded pack
    pub const fn archive(&self) -> &PackedArchive {
        &self.archive
    }
}

/// Resident bytes and use order of the cached packs
#[derive(Debug, Default)]
struct Residency {
    resident: usize,
    /// Bumped on every use
    tick: u64,
    /// Last-use tick to pack hash, oldest first
    order: BTreeMap<u64, u64>,
    ticks: HashMap<u64, u64>,
}

impl Residency {
    fn touch(&mut self, hash: u64) {
        self.tick += 1;
        if let Some(previous) = self.ticks.insert(hash, self.tick) {
            self.order.remove(&previous);
        }
        self.order.insert(self.tick, hash);
    }

    fn forget(&mut self, hash: u64) {
        if let Some(tick) = self.ticks.remove(&hash) {
            self.order.remove(&tick);
        }
    }

    fn oldest(&self) -> Option<u64> {
        self.order.first_key_value().map(|(_, &hash)| hash)
    }

    fn clear(&mut self) {
        self.resident = 0;
        self.order.clear();
        self.ticks.clear();
    }
}

/// Concurrent `pack hash -> decoded pack` memo
#[derive(Debug, Default)]
pub struct PackCache {
    packs: DashMap<u64, Arc<CachedPack>>,
    /// Use order is only tracked with a budget
    residency: Mutex<Residency>,
    budget: Option<usize>,
}

impl PackCache {
    /// Cache that never evicts
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Cache holding at most `budget` decoded payload bytes (plus the newest pack)
    pub fn with_budget(budget: usize) -> Self {
        Self {
            budget: Some(budget),
            ..Self::default()
        }
    }

    /// Cache for an optional budget
    pub fn new(budget: Option<usize>) -> Self {
        budget.map_or_else(Self::unbounded, Self::with_budget)
    }

    /// Configured budget
    pub const fn budget(&self) -> Option<usize> {
        self.budget
    }

    /// Cached pack for `hash`, marking it as recently used
    pub fn get(&self, hash: u64) -> Option<Arc<CachedPack>> {
        let pack = self.packs.get(&hash).map(|entry| Arc::clone(entry.value()))?;
        if self.budget.is_some() {
            let mut residency = self.residency.lock();
            // Evicted or cleared since the read above
            if self.packs.contains_key(&hash) {
                residency.touch(hash);
            }
        }
        Some(pack)
    }

    /// Cached pack for `hash`, decoding and inserting it on a miss
    ///
    /// `decode` runs without holding any cache lock and may run on several
    /// threads for the same hash; only the first result is kept.
    pub fn get_or_try_insert_with<E>(
        &self,
        hash: u64,
        decode: impl FnOnce() -> Result<PackedArchive, E>,
    ) -> Result<Arc<CachedPack>, E> {
        if let Some(pack) = self.get(hash) {
            debug!("Pack cache hit for {:016X}", hash);
            return Ok(pack);
        }

        debug!("Pack cache miss for {:016X}", hash);
        let candidate = Arc::new(CachedPack::new(hash, decode()?));

        let mut residency = self.residency.lock();
        let (pack, inserted) = match self.packs.entry(hash) {
            Entry::Occupied(existing) => (Arc::clone(existing.get()), false),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&candidate));
                (candidate, true)
            }
        };
        if inserted {
            residency.resident += pack.size();
        }
        if let Some(budget) = self.budget {
            residency.touch(hash);
            if inserted {
                self.evict_over_budget(&mut residency, budget, hash);
            }
        }
        Ok(pack)
    }

    /// Whether `hash` is cached
    pub fn contains(&self, hash: u64) -> bool {
        self.packs.contains_key(&hash)
    }

    /// Number of cached packs
    pub fn len(&self) -> usize {
        self.packs.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    /// Decoded payload bytes currently held
    pub fn resident_bytes(&self) -> usize {
        self.residency.lock().resident
    }

    /// Drop every cached pack
    pub fn clear(&self) {
        let mut residency = self.residency.lock();
        self.packs.clear();
        residency.clear();
    }

    fn evict_over_budget(&self, residency: &mut Residency, budget: usize, newest: u64) {
        while residency.resident > budget {
            let Some(oldest) = residency.oldest() else {
                break;
            };
            if oldest == newest {
                break;
            }
            residency.forget(oldest);
            if let Some((_, pack)) = self.packs.remove(&oldest) {
                residency.resident = residency.resident.saturating_sub(pack.size());
                warn!(
                    "Evicted pack {:016X} ({} bytes) to stay within {} byte budget",
                    oldest,
                    pack.size(),
                    budget
                );
            }
        }
    }
}
