//! Busy flags for operations that must not overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Holds a busy flag for as long as it lives. The flag is cleared on drop,
/// so an early return or a dropped future cannot leave it stuck.
pub(crate) struct InFlight<'a> {
    flag: &'a AtomicBool,
    released: Option<&'a Notify>,
}

impl<'a> InFlight<'a> {
    /// `None` if the flag is already held.
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag,
                released: None,
            })
    }

    /// Like `acquire`, and wakes everyone waiting on `released` once the
    /// flag is cleared again.
    pub(crate) fn acquire_signalled(flag: &'a AtomicBool, released: &'a Notify) -> Option<Self> {
        Self::acquire(flag).map(|mut held| {
            held.released = Some(released);
            held
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        if let Some(released) = self.released {
            released.notify_waiters();
        }
    }
}

/// State mutexes are only held for plain field updates, so a poisoned lock
/// still holds consistent data.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
