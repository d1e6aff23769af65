//! Read-optimized concurrent map.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: make reads of already-known keys lock-free; writes and first-time
//!   insertions pay a small, amortized synchronization cost.
//! - Two tables over shared entries:
//!   - Snapshot: an immutable key -> entry table published through
//!     `ArcSwap`; any number of readers walk it without locking. Its
//!     `amended` flag says "the dirty table may hold keys I don't".
//!   - Dirty table: a mutable overlay behind one `Mutex`, holding every live
//!     entry plus keys not yet published. Entries are shared by `Arc`, so a
//!     fast-path store against a snapshot entry is visible through both.
//! - Promotion: every lookup that had to take the lock counts as a miss;
//!   once misses reach the dirty table's size, the dirty table is published
//!   wholesale as the next snapshot and the counter resets. A workload that
//!   keeps missing therefore snaps back to lock-free reads after at most
//!   O(dirty-size) locked lookups.
//!
//! Tombstones
//! - When the dirty table is first built, snapshot entries holding no value
//!   are tombstoned and left out of it. A tombstoned entry can still be
//!   reached through the old snapshot but never serves a value; a later
//!   write to that key takes the lock, revives the entry, and re-links it
//!   into the dirty table.
//!
//! Consistency
//! - Snapshot publication is a single atomic replace; per-entry transitions
//!   are independently ordered, so cross-key ordering is the caller's
//!   problem. `for_each` promotes first and then walks one snapshot without
//!   the lock: no duplicates, no fabricated keys, but concurrent inserts and
//!   removes may or may not be observed.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::sync::Arc;

use arc_swap::ArcSwap;
use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::entry::Entry;

type Table<K, V, S> = HashMap<K, Arc<Entry<V>>, S>;

/// Immutable published view: a key -> entry table plus the `amended` flag.
/// Replaced wholesale, never mutated in place.
struct Snapshot<K, V, S> {
    entries: Arc<Table<K, V, S>>,
    amended: bool,
}

impl<K, V, S> Snapshot<K, V, S> {
    fn empty(hasher: S) -> Self {
        Self {
            entries: Arc::new(Table::with_hasher(hasher)),
            amended: false,
        }
    }
}

/// Mutable state behind the map's one exclusive lock: the dirty table (present
/// iff the published snapshot is amended) and the promotion miss counter.
struct DirtyState<K, V, S> {
    dirty: Option<Table<K, V, S>>,
    misses: usize,
}

/// Concurrent map optimized for read-mostly workloads with a stable key set.
///
/// `get` against a known key and `insert` against a live key never take the
/// map-wide lock. First-time insertions, deletions of unpublished keys, and
/// lookups of keys not yet in the snapshot serialize on one mutex, amortized
/// away by promotion. Values are copied out on read, so `V: Clone`; wrap
/// expensive values in `Arc` for cheap reads.
pub struct SyncMap<K, V, S = RandomState> {
    read: ArcSwap<Snapshot<K, V, S>>,
    dirty: Mutex<DirtyState<K, V, S>>,
    hasher: S,
}

impl<K, V> SyncMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::default())
    }
}

impl<K, V> Default for SyncMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> SyncMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            read: ArcSwap::from_pointee(Snapshot::empty(hasher.clone())),
            dirty: Mutex::new(DirtyState {
                dirty: None,
                misses: 0,
            }),
            hasher,
        }
    }

    /// Copy out the value for `key`, if present.
    ///
    /// Lock-free when the key is in the published snapshot or the snapshot is
    /// not amended; otherwise falls back to the dirty table under the lock,
    /// recording a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let read = self.read.load();
        if let Some(entry) = read.entries.get(key) {
            return entry.load();
        }
        if !read.amended {
            return None;
        }
        drop(read);

        let mut state = self.dirty.lock();
        // Double-check: another thread may have promoted between the first
        // snapshot read and the lock acquisition.
        let read = self.read.load();
        let entry = if let Some(entry) = read.entries.get(key) {
            Some(Arc::clone(entry))
        } else if read.amended {
            let entry = state
                .dirty
                .as_ref()
                .expect("amended snapshot without dirty table")
                .get(key)
                .cloned();
            // A miss is recorded whether or not the dirty lookup succeeded.
            self.miss_locked(&mut state);
            entry
        } else {
            None
        };
        drop(state);
        entry.and_then(|entry| entry.load())
    }

    /// Store `value` under `key`, overwriting any previous value.
    pub fn insert(&self, key: K, value: V) {
        let read = self.read.load();
        if let Some(entry) = read.entries.get(&key) {
            if entry.try_store(&value) {
                return;
            }
        }
        drop(read);

        let mut state = self.dirty.lock();
        let read = self.read.load_full();
        if let Some(entry) = read.entries.get(&key) {
            if entry.revive() {
                // The entry was tombstoned out of the dirty table; re-link it
                // so the next promotion carries the key forward.
                state
                    .dirty
                    .as_mut()
                    .expect("revived entry without dirty table")
                    .insert(key.clone(), Arc::clone(entry));
            }
            entry.store_locked(value);
        } else if let Some(entry) = state.dirty.as_ref().and_then(|d| d.get(&key)).cloned() {
            entry.store_locked(value);
        } else {
            if !read.amended {
                self.build_dirty_locked(&mut state, &read.entries);
                self.read.store(Arc::new(Snapshot {
                    entries: Arc::clone(&read.entries),
                    amended: true,
                }));
            }
            state
                .dirty
                .as_mut()
                .expect("dirty table must exist after construction")
                .insert(key, Arc::new(Entry::live(value)));
        }
    }

    /// Return the existing value for `key`, or store `value` and return it.
    /// The boolean is `true` when the value was already present.
    pub fn get_or_insert(&self, key: K, value: V) -> (V, bool) {
        let read = self.read.load();
        if let Some(entry) = read.entries.get(&key) {
            if let Some(result) = entry.try_load_or_store(&value) {
                return result;
            }
        }
        drop(read);

        let mut state = self.dirty.lock();
        let read = self.read.load_full();
        if let Some(entry) = read.entries.get(&key) {
            if entry.revive() {
                state
                    .dirty
                    .as_mut()
                    .expect("revived entry without dirty table")
                    .insert(key.clone(), Arc::clone(entry));
            }
            entry
                .try_load_or_store(&value)
                .expect("snapshot entry tombstoned while exclusive lock held")
        } else if let Some(entry) = state.dirty.as_ref().and_then(|d| d.get(&key)).cloned() {
            let result = entry
                .try_load_or_store(&value)
                .expect("dirty-table entry tombstoned while exclusive lock held");
            self.miss_locked(&mut state);
            result
        } else {
            if !read.amended {
                self.build_dirty_locked(&mut state, &read.entries);
                self.read.store(Arc::new(Snapshot {
                    entries: Arc::clone(&read.entries),
                    amended: true,
                }));
            }
            state
                .dirty
                .as_mut()
                .expect("dirty table must exist after construction")
                .insert(key, Arc::new(Entry::live(value.clone())));
            (value, false)
        }
    }

    /// Remove `key`, returning its value if one was present.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let read = self.read.load();
        let mut entry = read.entries.get(key).cloned();
        let amended = read.amended;
        drop(read);

        if entry.is_none() && amended {
            let mut state = self.dirty.lock();
            let read = self.read.load();
            entry = read.entries.get(key).cloned();
            if entry.is_none() && read.amended {
                // Unlike snapshot entries, a dirty-only mapping is erased
                // outright; the key was never published.
                entry = state
                    .dirty
                    .as_mut()
                    .expect("amended snapshot without dirty table")
                    .remove(key);
                self.miss_locked(&mut state);
            }
        }
        entry.and_then(|entry| entry.delete())
    }

    /// Visit every key currently resident in the map; the visitor returns
    /// `false` to stop early.
    ///
    /// Promotes the dirty table first (if any), then walks a single snapshot
    /// without the lock. Weakly consistent: no key is visited twice and no
    /// fabricated key appears, but entries inserted or removed concurrently
    /// may or may not be observed.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut read = self.read.load_full();
        if read.amended {
            let mut state = self.dirty.lock();
            read = self.read.load_full();
            if read.amended {
                let table = state
                    .dirty
                    .take()
                    .expect("amended snapshot without dirty table");
                let promoted = Arc::new(Snapshot {
                    entries: Arc::new(table),
                    amended: false,
                });
                self.read.store(Arc::clone(&promoted));
                state.misses = 0;
                read = promoted;
            }
        }

        for (key, entry) in read.entries.iter() {
            if let Some(value) = entry.load() {
                if !visitor(key, &value) {
                    break;
                }
            }
        }
    }

    /// Discard every key and value.
    pub fn clear(&self) {
        let _ = self.take_entries();
    }

    /// Empty the map and return its live contents.
    pub fn drain(&self) -> HashMap<K, V, S> {
        let entries = self.take_entries();
        let mut out = HashMap::with_capacity_and_hasher(entries.len(), self.hasher.clone());
        for (key, entry) in entries.iter() {
            if let Some(value) = entry.load() {
                out.insert(key.clone(), value);
            }
        }
        out
    }

    /// Take ownership of whichever table holds the authoritative contents and
    /// publish an empty snapshot in its place.
    fn take_entries(&self) -> Arc<Table<K, V, S>> {
        let mut state = self.dirty.lock();
        let read = self.read.load_full();
        let entries = if read.amended {
            Arc::new(
                state
                    .dirty
                    .take()
                    .expect("amended snapshot without dirty table"),
            )
        } else {
            Arc::clone(&read.entries)
        };
        self.read
            .store(Arc::new(Snapshot::empty(self.hasher.clone())));
        state.dirty = None;
        state.misses = 0;
        entries
    }

    /// Record one locked lookup; promote the dirty table once misses reach
    /// its size, bounding locked lookups per amendment cycle.
    fn miss_locked(&self, state: &mut DirtyState<K, V, S>) {
        state.misses += 1;
        let dirty_len = state
            .dirty
            .as_ref()
            .expect("miss recorded without dirty table")
            .len();
        if state.misses < dirty_len {
            return;
        }
        let table = state
            .dirty
            .take()
            .expect("miss recorded without dirty table");
        self.read.store(Arc::new(Snapshot {
            entries: Arc::new(table),
            amended: false,
        }));
        state.misses = 0;
    }

    /// Build the dirty table from the current snapshot: tombstone every
    /// valueless entry (dropping its key), keep every live entry by shared
    /// reference. Runs once per amendment cycle.
    fn build_dirty_locked(&self, state: &mut DirtyState<K, V, S>, snapshot: &Table<K, V, S>) {
        if state.dirty.is_some() {
            return;
        }
        let mut dirty = Table::with_capacity_and_hasher(snapshot.len(), self.hasher.clone());
        for (key, entry) in snapshot.iter() {
            if !entry.try_tombstone() {
                dirty.insert(key.clone(), Arc::clone(entry));
            }
        }
        state.dirty = Some(dirty);
    }
}
