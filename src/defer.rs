//! Scope-exit guard.
//!
//! `Defer` runs a registered closure when the enclosing scope is exited
//! through any path: normal return, early `return`/`?`, or an unwinding
//! panic. `cancel` suppresses the closure. Used internally by [`crate::Once`]
//! and [`crate::single_call`] to restore flags on every exit path.

/// RAII guard that runs its closure on drop unless cancelled.
pub struct Defer<F: FnOnce()> {
    routine: Option<F>,
}

impl<F: FnOnce()> Defer<F> {
    /// Register `routine` to run when this guard is dropped.
    #[inline]
    pub fn new(routine: F) -> Self {
        Self {
            routine: Some(routine),
        }
    }

    /// Suppress the registered routine; it will not run.
    #[inline]
    pub fn cancel(mut self) {
        self.routine = None;
    }
}

impl<F: FnOnce()> Drop for Defer<F> {
    fn drop(&mut self) {
        if let Some(routine) = self.routine.take() {
            routine();
        }
    }
}
