//! Per-key atomic entry: a tri-state lifecycle tag plus a narrowly-locked
//! payload slot.
//!
//! The lifecycle tag (`Empty` / `Live` / `Tombstoned`) is an atomic that
//! readers check without any lock, so lookups of absent entries never block.
//! Every transition of the tag happens while holding the per-entry payload
//! mutex, together with the payload change it describes; under that lock the
//! tag and the slot are always coherent (`Live` iff the slot is `Some`).
//! Without the lock a reader may see a stale `Live` from before a racing
//! delete; it then takes the lock, finds the slot empty, and reports
//! not-found.
//!
//! `Tombstoned` marks an entry that was skipped during dirty-table
//! construction because it held no value: it must not be resurrected through
//! the snapshot that still references it; a write to that key goes through
//! the map's exclusive lock, which revives the entry and re-links it into
//! the dirty table.

use core::sync::atomic::{AtomicU8, Ordering};
use parking_lot::Mutex;

const EMPTY: u8 = 0;
const LIVE: u8 = 1;
const TOMBSTONE: u8 = 2;

/// One key's value slot, shared by `Arc` between the snapshot and the dirty
/// table so fast-path stores stay visible through both.
pub(crate) struct Entry<V> {
    state: AtomicU8,
    payload: Mutex<Option<V>>,
}

impl<V: Clone> Entry<V> {
    /// Create a `Live` entry holding `value`.
    pub(crate) fn live(value: V) -> Self {
        Self {
            state: AtomicU8::new(LIVE),
            payload: Mutex::new(Some(value)),
        }
    }

    /// Copy the current value out, or `None` if the entry holds no value.
    ///
    /// Lock-free on the not-found paths; takes the per-entry section only to
    /// copy a live payload. A delete may land between the tag check and the
    /// lock, in which case the slot reads empty and this reports not-found.
    pub(crate) fn load(&self) -> Option<V> {
        let state = self.state.load(Ordering::Acquire);
        if state != LIVE {
            return None;
        }
        self.payload.lock().clone()
    }

    /// Store `value` unless the entry has been tombstoned.
    ///
    /// Returns `false` if a dirty-table construction pass tombstoned this
    /// entry; the caller must retry through the exclusive-lock path.
    pub(crate) fn try_store(&self, value: &V) -> bool {
        let mut slot = self.payload.lock();
        if self.state.load(Ordering::Acquire) == TOMBSTONE {
            return false;
        }
        self.state.store(LIVE, Ordering::Release);
        *slot = Some(value.clone());
        true
    }

    /// Unconditional store; callers must hold the map's exclusive lock.
    /// The entry is `Live` afterwards regardless of its previous state.
    pub(crate) fn store_locked(&self, value: V) {
        let mut slot = self.payload.lock();
        self.state.store(LIVE, Ordering::Release);
        *slot = Some(value);
    }

    /// Load the existing value, or store `value` if the slot is empty.
    ///
    /// `None` means the entry is tombstoned and the caller must retry via the
    /// locked path. `Some((actual, loaded))` carries the value now in the
    /// entry and whether it was already present.
    pub(crate) fn try_load_or_store(&self, value: &V) -> Option<(V, bool)> {
        let mut slot = self.payload.lock();
        if self.state.load(Ordering::Acquire) == TOMBSTONE {
            return None;
        }
        if let Some(existing) = slot.clone() {
            return Some((existing, true));
        }
        self.state.store(LIVE, Ordering::Release);
        *slot = Some(value.clone());
        Some((value.clone(), false))
    }

    /// Transition `Live -> Empty` and move the payload out.
    /// No-op returning `None` when the entry holds no value.
    pub(crate) fn delete(&self) -> Option<V> {
        let mut slot = self.payload.lock();
        if self.state.load(Ordering::Acquire) != LIVE {
            return None;
        }
        self.state.store(EMPTY, Ordering::Release);
        let taken = slot.take();
        debug_assert!(taken.is_some(), "live entry held no payload");
        taken
    }

    /// Transition `Empty -> Tombstoned`; used only during dirty-table
    /// construction, under the map's exclusive lock.
    ///
    /// Returns `true` if the entry is tombstoned afterwards (whether it
    /// already was or was just transitioned), `false` if it is `Live`.
    pub(crate) fn try_tombstone(&self) -> bool {
        let slot = self.payload.lock();
        match self.state.load(Ordering::Acquire) {
            EMPTY => {
                debug_assert!(slot.is_none(), "empty entry held a payload");
                self.state.store(TOMBSTONE, Ordering::Release);
                true
            }
            TOMBSTONE => true,
            _ => false,
        }
    }

    /// Transition `Tombstoned -> Empty`; used under the map's exclusive lock
    /// when a write targets a tombstoned snapshot entry. Returns `true` if
    /// this call performed the revival (the caller must then re-link the
    /// entry into the dirty table).
    pub(crate) fn revive(&self) -> bool {
        let slot = self.payload.lock();
        if self.state.load(Ordering::Acquire) != TOMBSTONE {
            return false;
        }
        debug_assert!(slot.is_none(), "tombstoned entry held a payload");
        self.state.store(EMPTY, Ordering::Release);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{Entry, LIVE};
    use core::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn live_entry_loads_value() {
        let e = Entry::live(7);
        assert_eq!(e.load(), Some(7));
    }

    #[test]
    fn delete_moves_value_out_once() {
        let e = Entry::live("v".to_string());
        assert_eq!(e.delete(), Some("v".to_string()));
        assert_eq!(e.delete(), None);
        assert_eq!(e.load(), None);
    }

    #[test]
    fn tombstone_only_from_empty() {
        let e = Entry::live(1);
        assert!(!e.try_tombstone());
        e.delete();
        assert!(e.try_tombstone());
        // Idempotent once tombstoned.
        assert!(e.try_tombstone());
        assert!(!e.try_store(&2));
        assert!(e.try_load_or_store(&2).is_none());
    }

    #[test]
    fn revive_makes_entry_storable_again() {
        let e = Entry::live(1);
        e.delete();
        assert!(e.try_tombstone());
        assert!(e.revive());
        assert!(!e.revive());
        assert!(e.try_store(&3));
        assert_eq!(e.load(), Some(3));
    }

    #[test]
    fn try_load_or_store_prefers_existing() {
        let e = Entry::live(10);
        assert_eq!(e.try_load_or_store(&20), Some((10, true)));
        e.delete();
        assert_eq!(e.try_load_or_store(&20), Some((20, false)));
        assert_eq!(e.load(), Some(20));
    }

    // A store/delete/load-or-store storm on one entry. Transitions are
    // serialized on the payload lock, so every operation must terminate
    // and the tag must agree with the slot once the threads are done:
    // a Live tag with an empty slot would wedge load-or-store callers.
    #[test]
    fn concurrent_store_delete_storm_stays_coherent() {
        let entry = Arc::new(Entry::live(0u64));
        let threads = 4u64;
        let rounds = 10_000u64;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let entry = Arc::clone(&entry);
                thread::spawn(move || {
                    for i in 0..rounds {
                        match i % 3 {
                            0 => {
                                assert!(entry.try_store(&(t * rounds + i)));
                            }
                            1 => {
                                entry.delete();
                            }
                            _ => {
                                // Never tombstoned here, so this must always
                                // return, with a value some thread wrote.
                                let (v, _loaded) = entry
                                    .try_load_or_store(&i)
                                    .expect("entry was never tombstoned");
                                assert!(v < threads * rounds);
                            }
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let live = entry.state.load(Ordering::Acquire) == LIVE;
        let slot = entry.payload.lock().clone();
        assert_eq!(live, slot.is_some(), "tag and payload slot disagree");
    }
}
