//! Run-once execution guard.
//!
//! Three guarantees, in increasing strength:
//! 1. a `Once` runs at most one action ever; later `call`s are no-ops;
//! 2. with concurrent callers, exactly one thread executes the action;
//! 3. every `call` returns only after that one execution has completed, so
//!    callers may rely on its effects being visible.
//!
//! The done flag is set on every exit path of the action, including an
//! unwinding panic, so a panicking action still counts as the one execution.

use core::sync::atomic::{AtomicBool, Ordering};
use parking_lot::Mutex;

use crate::defer::Defer;

pub struct Once {
    done: AtomicBool,
    mu: Mutex<()>,
}

impl Once {
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            mu: Mutex::new(()),
        }
    }

    /// Execute `action` if no action has run yet; otherwise wait until the
    /// running action completes, then return.
    pub fn call<F: FnOnce()>(&self, action: F) {
        if !self.done.load(Ordering::Acquire) {
            self.call_slow(action);
        }
    }

    /// Whether the one execution has completed.
    pub fn is_completed(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    #[cold]
    fn call_slow<F: FnOnce()>(&self, action: F) {
        let _guard = self.mu.lock();
        if !self.done.load(Ordering::Relaxed) {
            // Mark done on every exit path; a panicking action still counts.
            let _mark = Defer::new(|| self.done.store(true, Ordering::Release));
            action();
        }
    }
}

impl Default for Once {
    fn default() -> Self {
        Self::new()
    }
}
