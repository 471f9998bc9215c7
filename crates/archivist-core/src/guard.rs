//! Reentrancy guard.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Suspends archival interception while an archival move (or any caller
/// supplied operation) runs.
///
/// One guard belongs to one [`Archivist`](crate::Archivist), so suspension
/// on one connection never affects another. Threads sharing a single
/// `Archivist` share its guard: while one of them holds it, deletes issued
/// by the others are passed through unarchived rather than blocked.
#[derive(Debug, Default)]
pub struct ArchiveGuard {
    lock: Mutex<()>,
    engaged: AtomicBool,
}

impl ArchiveGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if interception is currently suspended.
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }

    /// Run `f` with interception suspended.
    ///
    /// Nested calls run `f` directly. The flag is cleared on every exit
    /// path, including unwinding.
    pub fn suspend<T>(&self, f: impl FnOnce() -> T) -> T {
        if self.is_engaged() {
            return f();
        }
        let _lock = self.lock.lock();
        self.engaged.store(true, Ordering::Release);
        let _reset = Reset(&self.engaged);
        f()
    }
}

struct Reset<'a>(&'a AtomicBool);

impl Drop for Reset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
