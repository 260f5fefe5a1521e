//! Lock helper shared by the emulator's registries.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `mutex`, recovering the guard if a callback panicked while holding it.
///
/// Registry state stays structurally valid across a panic (every mutation is
/// a single push/remove/assign), so the poisoned value is safe to keep using.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
