//! Two-tier map: a best-effort read cache in front of a lock-guarded table.
//!
//! The backing [`HashTable`] is authoritative; the read cache absorbs
//! repeated lookups (including negative ones) so hot readers mostly touch a
//! shared lock on an immutable-ish cache instead of contending with writers
//! on the backing table. Values are stored behind `Arc` and never mutated in
//! place, so a cached pointer is always safe to read.
//!
//! Simpler and less contention-resistant than [`crate::SyncMap`]: a cache
//! miss still pays two lock acquisitions, and `put` always takes the backing
//! table's write lock.

use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::hash_table::{HashTable, PutStatus};

/// One cached slot. `None` caches a negative lookup.
struct CacheCell<V> {
    slot: RwLock<Option<Arc<V>>>,
}

impl<V> CacheCell<V> {
    fn new(value: Option<Arc<V>>) -> Self {
        Self {
            slot: RwLock::new(value),
        }
    }

    fn load(&self) -> Option<Arc<V>> {
        self.slot.read().clone()
    }

    fn store(&self, value: Option<Arc<V>>) {
        *self.slot.write() = value;
    }
}

/// The cache tier: key -> shared cell. Cells are shared so a refresh never
/// invalidates a concurrently held pointer.
struct ReadCache<K, V, S> {
    map: RwLock<HashMap<K, Arc<CacheCell<V>>, S>>,
}

impl<K, V, S> ReadCache<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    fn with_hasher(hasher: S) -> Self {
        Self {
            map: RwLock::new(HashMap::with_hasher(hasher)),
        }
    }

    fn get(&self, key: &K) -> Option<Arc<CacheCell<V>>> {
        self.map.read().get(key).cloned()
    }

    /// Refresh the cell for `key` only if one is already cached.
    fn try_store(&self, key: &K, value: Option<Arc<V>>) {
        if let Some(cell) = self.get(key) {
            cell.store(value);
        }
    }

    /// Insert a cell for `key`, or refresh the existing one.
    fn update(&self, key: K, value: Option<Arc<V>>) {
        let cell = {
            let mut map = self.map.write();
            match map.entry(key) {
                hashbrown::hash_map::Entry::Vacant(slot) => {
                    slot.insert(Arc::new(CacheCell::new(value)));
                    return;
                }
                hashbrown::hash_map::Entry::Occupied(slot) => Arc::clone(slot.get()),
            }
        };
        // Store outside the cache lock; the cell has its own.
        cell.store(value);
    }

    fn clear(&self) {
        let mut map = self.map.write();
        map.clear();
    }
}

/// Read-cached map over a lock-guarded backing table.
pub struct CachedMap<K, V, S = RandomState> {
    read: ReadCache<K, V, S>,
    write: HashTable<K, Arc<V>, S>,
}

impl<K, V> CachedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::default())
    }
}

impl<K, V> Default for CachedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> CachedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            read: ReadCache::with_hasher(hasher.clone()),
            write: HashTable::with_hasher(hasher),
        }
    }

    /// Insert or overwrite, then opportunistically refresh the cache.
    ///
    /// A fresh `Arc` is inserted rather than mutating the old value, so
    /// readers holding the previous pointer keep a consistent view.
    pub fn put(&self, key: K, value: V) -> PutStatus {
        let value = Arc::new(value);
        let status = self.write.put(key.clone(), Arc::clone(&value));
        self.read.try_store(&key, Some(value));
        status
    }

    /// Insert only if absent; the cache is refreshed only on success.
    pub fn try_put(&self, key: K, value: V) -> PutStatus {
        let value = Arc::new(value);
        let status = self.write.try_put(key.clone(), Arc::clone(&value));
        if status == PutStatus::New {
            self.read.try_store(&key, Some(value));
        }
        status
    }

    /// Copy out the value for `key`, preferring the cache and repopulating it
    /// on miss. Negative lookups are cached too.
    pub fn get(&self, key: &K) -> Option<V> {
        let value = match self.read.get(key) {
            Some(cell) => cell.load(),
            None => {
                let value = self.write.get(key);
                self.read.update(key.clone(), value.clone());
                value
            }
        };
        value.map(|value| (*value).clone())
    }

    /// Remove `key` from the backing table and blank its cache cell.
    pub fn remove(&self, key: &K) -> Option<V> {
        let value = self.write.remove(key)?;
        self.read.update(key.clone(), None);
        Some(Arc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone()))
    }

    pub fn len(&self) -> usize {
        self.write.len()
    }

    pub fn is_empty(&self) -> bool {
        self.write.is_empty()
    }

    /// Drop both tiers' contents.
    pub fn clear(&self) {
        let _ = self.write.take();
        self.read.clear();
    }

    /// Empty the map and return its contents.
    pub fn take(&self) -> HashMap<K, V, S> {
        let backing = self.write.take();
        self.read.clear();
        let mut out = HashMap::with_capacity_and_hasher(backing.len(), backing.hasher().clone());
        for (key, value) in backing {
            out.insert(
                key,
                Arc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone()),
            );
        }
        out
    }
}
