//! syncmap: a read-optimized concurrent map plus a small toolkit of
//! synchronization primitives for shared in-memory state.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: make reads of already-known keys lock-free while keeping the
//!   write path simple, and offer plainer lock-based siblings for workloads
//!   that don't need the read optimization.
//! - Layers:
//!   - `Entry<V>` (private): per-key tri-state atomic lifecycle
//!     (empty / live / tombstoned) with a narrowly-locked payload slot.
//!   - `SyncMap<K, V, S>`: the core map. An immutable snapshot published
//!     through `arc-swap`, a mutex-guarded dirty overlay, and a miss counter
//!     that amortizes promotion of the overlay into the next snapshot.
//!   - `HashTable<K, V, S>`: one rwlock around a `hashbrown::HashMap`; the
//!     simplicity baseline.
//!   - `CachedMap<K, V, S>`: a best-effort read cache in front of a
//!     `HashTable`; the middle trade-off point.
//!   - `List<T>`, `Once`, `single_call`, `Defer`: small primitives that
//!     round out the toolkit.
//!
//! Choosing a map
//! - Read-mostly, stable key set, writers must never stall readers:
//!   [`SyncMap`].
//! - Balanced read/write, low contention: [`HashTable`].
//! - Read-mostly but the key set churns too much for snapshot promotion to
//!   pay off: [`CachedMap`].
//!
//! Constraints
//! - Values are copied out on read (`V: Clone`); store `Arc<V>` for cheap
//!   reads of large values.
//! - No recoverable errors: found/not-found is `Option`, statuses are small
//!   enums. Internal invariant violations fail fast rather than continue
//!   with corrupted shared state.
//! - No cross-key ordering: per-entry transitions are independently ordered;
//!   callers needing it must impose it externally.

mod cached_map;
mod defer;
mod entry;
mod hash_table;
mod list;
mod map;
mod once;
mod single_call;

// Public surface
pub use cached_map::CachedMap;
pub use defer::Defer;
pub use hash_table::{HashTable, PutStatus};
pub use list::List;
pub use map::SyncMap;
pub use once::Once;
pub use single_call::single_call;
