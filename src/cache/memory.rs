//! Memory Cache Module
//!
//! Byte-bounded LRU cache of decoded assets.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStats, LruTracker};

/// Computes the accounted size of an asset in bytes.
pub type SizeFn<A> = Box<dyn Fn(&A) -> usize + Send + Sync>;

// == Memory Entry ==
struct MemoryEntry<A> {
    asset: Arc<A>,
    size_bytes: usize,
}

// == Memory Cache ==
/// In-process cache of decoded assets, bounded by total byte size.
///
/// Entries are evicted by access order: both `get` and `put` promote a key.
/// The sum of entry sizes never exceeds `capacity_bytes`.
pub struct MemoryCache<A> {
    entries: HashMap<CacheKey, MemoryEntry<A>>,
    lru: LruTracker<CacheKey>,
    stats: CacheStats,
    size_of: SizeFn<A>,
    capacity_bytes: usize,
    total_bytes: usize,
}

impl<A> MemoryCache<A> {
    // == Constructor ==
    /// Creates a cache holding at most `capacity_bytes`, measuring each
    /// asset with `size_of`.
    pub fn new(capacity_bytes: usize, size_of: impl Fn(&A) -> usize + Send + Sync + 'static) -> Self {
        let stats = CacheStats {
            capacity_bytes: capacity_bytes as u64,
            ..CacheStats::default()
        };

        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats,
            size_of: Box::new(size_of),
            capacity_bytes,
            total_bytes: 0,
        }
    }

    // == Get ==
    /// Returns the asset for `key` and marks it most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<A>> {
        match self.entries.get(key) {
            Some(entry) => {
                let asset = Arc::clone(&entry.asset);
                self.lru.touch(key);
                self.stats.record_hit();
                Some(asset)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Put ==
    /// Inserts or replaces the asset for `key`, then evicts least recently
    /// used entries until the cache fits its capacity.
    ///
    /// An asset larger than the whole capacity is not cached; any previous
    /// asset under the same key is dropped and `false` is returned.
    pub fn put(&mut self, key: CacheKey, asset: Arc<A>) -> bool {
        let size_bytes = (self.size_of)(&asset);
        self.remove(&key);

        if size_bytes > self.capacity_bytes {
            warn!(
                key = %key,
                size_bytes,
                capacity_bytes = self.capacity_bytes,
                "Asset larger than memory cache capacity, not cached"
            );
            return false;
        }

        self.total_bytes += size_bytes;
        self.lru.touch(&key);
        self.entries.insert(key, MemoryEntry { asset, size_bytes });

        self.trim_to_capacity();
        self.sync_occupancy();
        true
    }

    // == Remove ==
    /// Removes an entry, returning its asset.
    pub fn remove(&mut self, key: &CacheKey) -> Option<Arc<A>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.total_bytes -= entry.size_bytes;
        self.sync_occupancy();
        Some(entry.asset)
    }

    // == Contains ==
    /// Checks presence without touching recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.total_bytes = 0;
        self.sync_occupancy();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently accounted.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    fn trim_to_capacity(&mut self) {
        while self.total_bytes > self.capacity_bytes {
            let Some(oldest) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                self.total_bytes -= entry.size_bytes;
                self.stats.record_eviction();
                debug!(key = %oldest, size_bytes = entry.size_bytes, "Evicted from memory cache");
            }
        }
    }

    fn sync_occupancy(&mut self) {
        self.stats
            .set_occupancy(self.entries.len(), self.total_bytes as u64);
    }
}

impl<A> fmt::Debug for MemoryCache<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.len())
            .field("total_bytes", &self.total_bytes)
            .field("capacity_bytes", &self.capacity_bytes)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyHasher;

    fn key(name: &str) -> CacheKey {
        CacheKey::parse(name).unwrap()
    }

    fn sized_cache(capacity: usize) -> MemoryCache<Vec<u8>> {
        MemoryCache::new(capacity, |bytes: &Vec<u8>| bytes.len())
    }

    #[test]
    fn test_put_then_get_returns_same_asset() {
        let mut cache = sized_cache(100);
        let asset = Arc::new(vec![1u8, 2, 3]);

        assert!(cache.put(key("a"), Arc::clone(&asset)));
        let fetched = cache.get(&key("a")).unwrap();

        assert!(Arc::ptr_eq(&fetched, &asset));
        assert_eq!(cache.total_bytes(), 3);
    }

    #[test]
    fn test_unit_sizes_evict_first_inserted() {
        let mut cache = sized_cache(3);

        for name in ["a", "b", "c", "d"] {
            cache.put(key(name), Arc::new(vec![0u8]));
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&key("a")));
        assert!(cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
        assert!(cache.contains(&key("d")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_promotes_recency() {
        let mut cache = sized_cache(3);

        cache.put(key("a"), Arc::new(vec![0u8]));
        cache.put(key("b"), Arc::new(vec![0u8]));
        cache.put(key("c"), Arc::new(vec![0u8]));

        cache.get(&key("a"));
        cache.put(key("d"), Arc::new(vec![0u8]));

        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
    }

    #[test]
    fn test_large_put_evicts_several_entries() {
        let mut cache = sized_cache(10);

        cache.put(key("a"), Arc::new(vec![0u8; 4]));
        cache.put(key("b"), Arc::new(vec![0u8; 4]));
        cache.put(key("c"), Arc::new(vec![0u8; 9]));

        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key("c")));
        assert_eq!(cache.total_bytes(), 9);
    }

    #[test]
    fn test_replace_recomputes_size() {
        let mut cache = sized_cache(10);

        cache.put(key("a"), Arc::new(vec![0u8; 8]));
        cache.put(key("a"), Arc::new(vec![0u8; 2]));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), 2);
    }

    #[test]
    fn test_oversized_asset_rejected() {
        let mut cache = sized_cache(4);

        cache.put(key("a"), Arc::new(vec![0u8; 2]));
        assert!(!cache.put(key("a"), Arc::new(vec![0u8; 5])));

        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let mut cache = sized_cache(10);
        let k = KeyHasher::Sha256.hash("https://example.com/x.png");

        assert!(cache.get(&k).is_none());
        cache.put(k.clone(), Arc::new(vec![0u8; 3]));
        assert!(cache.get(&k).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_bytes, 3);
        assert_eq!(stats.capacity_bytes, 10);
    }

    #[test]
    fn test_clear() {
        let mut cache = sized_cache(10);
        cache.put(key("a"), Arc::new(vec![0u8; 3]));
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);
        assert!(cache.remove(&key("a")).is_none());
    }
}
