//! Plain lock-guarded hash table.
//!
//! The simplest trade-off point in the crate: one reader-writer lock around a
//! `hashbrown::HashMap`. Reads share the lock, writes exclude everything.
//! [`crate::SyncMap`] is the read-optimized alternative; this type exists for
//! workloads where contention is low and simplicity wins, and as the backing
//! table of [`crate::CachedMap`].

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

use hashbrown::HashMap;
use parking_lot::RwLock;

/// Outcome of a [`HashTable::put`] or [`HashTable::try_put`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PutStatus {
    /// The key was not present; the value was inserted.
    New,
    /// The key was present; `put` replaced its value.
    Overwrite,
    /// The key was present; `try_put` left it untouched.
    Skipped,
}

/// Thread-safe hash table guarded by one shared/exclusive lock.
pub struct HashTable<K, V, S = RandomState> {
    map: RwLock<HashMap<K, V, S>>,
}

impl<K, V> HashTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::default())
    }
}

impl<K, V> Default for HashTable<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            map: RwLock::new(HashMap::with_hasher(hasher)),
        }
    }

    /// Insert or overwrite.
    pub fn put(&self, key: K, value: V) -> PutStatus {
        let mut map = self.map.write();
        match map.insert(key, value) {
            None => PutStatus::New,
            Some(_) => PutStatus::Overwrite,
        }
    }

    /// Insert only if the key is absent; never overwrites.
    pub fn try_put(&self, key: K, value: V) -> PutStatus {
        let mut map = self.map.write();
        match map.entry(key) {
            hashbrown::hash_map::Entry::Vacant(slot) => {
                slot.insert(value);
                PutStatus::New
            }
            hashbrown::hash_map::Entry::Occupied(_) => PutStatus::Skipped,
        }
    }

    /// Copy out the value for `key`, if present.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.map.read().get(key).cloned()
    }

    /// Apply `f` to the value for `key` under the shared lock, avoiding a
    /// clone when only a projection of the value is needed.
    pub fn get_with<Q, F, T>(&self, key: &Q, f: F) -> Option<T>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&V) -> T,
    {
        self.map.read().get(key).map(f)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.read().contains_key(key)
    }

    /// Remove `key`, returning its value if one was present.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.map.write().clear();
    }

    /// Empty the table and return its previous contents.
    pub fn take(&self) -> HashMap<K, V, S>
    where
        S: Clone,
    {
        let mut map = self.map.write();
        let hasher = map.hasher().clone();
        core::mem::replace(&mut *map, HashMap::with_hasher(hasher))
    }

    /// Visit every entry under the shared lock. The visitor must not call
    /// back into this table, or it will deadlock on the write paths.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        let map = self.map.read();
        for (key, value) in map.iter() {
            f(key, value);
        }
    }

    /// Keep only the entries for which `pred` returns `true`; returns the
    /// number removed.
    pub fn retain<F>(&self, mut pred: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut map = self.map.write();
        let before = map.len();
        map.retain(|key, value| pred(key, value));
        before - map.len()
    }
}
