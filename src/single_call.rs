//! Non-blocking single-attempt guard.
//!
//! Unlike [`crate::Once`], losers do not wait: exactly one concurrent caller
//! wins the flag and runs the action; everyone else returns `false`
//! immediately. The flag is caller-owned so one flag can gate many call
//! sites, and it is restored when the action returns or unwinds, making the
//! guard reusable for the next attempt. It cannot, of course, stop the
//! caller from simply trying again.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::defer::Defer;

/// Run `action` if this caller transitioned `flag` from idle to running.
/// Returns whether the action ran.
pub fn single_call<F: FnOnce()>(flag: &AtomicBool, action: F) -> bool {
    if flag
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return false;
    }
    // Restore the flag even if the action unwinds.
    let _reset = Defer::new(|| flag.store(false, Ordering::Release));
    action();
    true
}
