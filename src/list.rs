//! Concurrent list with wait-free-ish appends and blocking scans.
//!
//! Appends land in a small mutex-guarded pending buffer and never wait on a
//! scan in progress; scans first fold the pending buffer into the main vector
//! under the write lock, then iterate under the read lock so concurrent
//! appends are not starved by a long visitor.

use parking_lot::{Mutex, RwLock};

pub struct List<T> {
    items: RwLock<Vec<T>>,
    pending: Mutex<Vec<T>>,
}

impl<T> List<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Append a value. Only the pending buffer's lock is taken, so appends
    /// are never blocked by a running scan.
    pub fn push(&self, value: T) {
        self.pending.lock().push(value);
    }

    /// Visit every element. Pending appends are folded in first, so anything
    /// pushed before this call is observed.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        {
            let mut items = self.items.write();
            let mut pending = self.pending.lock();
            items.append(&mut pending);
        }

        let items = self.items.read();
        for value in items.iter() {
            f(value);
        }
    }

    /// Keep only the elements for which `pred` returns `true`, including
    /// pending ones; returns the number removed.
    pub fn retain<F>(&self, mut pred: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|value| pred(value));
        let mut removed = before - items.len();

        let pending = core::mem::take(&mut *self.pending.lock());
        for value in pending {
            if pred(&value) {
                items.push(value);
            } else {
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.items.read().len() + self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}
