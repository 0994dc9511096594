//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every touch stamps the key with a fresh sequence number:
/// - `index` maps key -> current stamp
/// - `order` maps stamp -> key, lowest stamp = least recently used
///
/// Touch, remove and evict are O(log n).
#[derive(Debug)]
pub struct LruTracker<K = String> {
    index: HashMap<K, u64>,
    order: BTreeMap<u64, K>,
    next_stamp: u64,
}

impl<K> Default for LruTracker<K> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            order: BTreeMap::new(),
            next_stamp: 0,
        }
    }
}

impl<K: Hash + Eq + Clone> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, adding it if new.
    pub fn touch<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
    {
        let stamp = self.next_stamp;
        self.next_stamp += 1;

        match self.index.get_mut(key) {
            Some(current) => {
                if let Some(owned) = self.order.remove(&*current) {
                    self.order.insert(stamp, owned);
                }
                *current = stamp;
            }
            None => {
                let owned = key.to_owned();
                self.order.insert(stamp, owned.clone());
                self.index.insert(owned, stamp);
            }
        }
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if let Some(stamp) = self.index.remove(key) {
            self.order.remove(&stamp);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.index.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.values().next()
    }

    // == Oldest First ==
    /// Iterates keys from least to most recently used.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = &K> {
        self.order.values()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.contains_key(key)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.index.clear();
        self.order.clear();
    }
}
