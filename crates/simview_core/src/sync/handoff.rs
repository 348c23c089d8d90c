//! # Handoff Semaphore
//!
//! Binary, single-slot rendezvous between a simulation's driving thread and
//! the render coordinator.
//!
//! ```text
//!   Driving thread                     Render coordinator
//!   ──────────────                     ──────────────────
//!   raise pending flag
//!   acquire() ───── blocks ───┐
//!                             │        sees pending flag
//!                             │        renders camera, writes FrameBuffer
//!                             └─────── release()
//!   returns, reads FrameBuffer
//! ```
//!
//! ## Happens-before
//!
//! Everything the releasing thread wrote before `release()` is visible to the
//! thread whose `acquire()` consumes that release. The slot is guarded by a
//! mutex, so the guarantee falls out of lock acquire/release ordering.
//!
//! ## Lost wakeups
//!
//! `release()` with no waiter leaves the slot set. The next `acquire()`
//! returns immediately, so a coordinator that finishes before the requester
//! reaches `acquire()` cannot strand it.

use parking_lot::{Condvar, Mutex};

/// Single-slot blocking signal.
///
/// `acquire()` has no timeout on purpose: a camera request must observe a
/// frame rendered at its own simulation time, never give up half way. Callers
/// that cannot guarantee a live releaser must check that before blocking.
#[derive(Debug, Default)]
pub struct HandoffSemaphore {
    /// `true` when a release is waiting to be consumed.
    slot: Mutex<bool>,
    /// Wakes waiters blocked in `acquire`.
    ready: Condvar,
}

impl HandoffSemaphore {
    /// Creates an unset semaphore.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(false),
            ready: Condvar::new(),
        }
    }

    /// Returns whether a release is currently waiting to be consumed.
    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.slot.lock()
    }

    /// Blocks until the slot is set, then consumes it.
    ///
    /// Spurious wakeups are filtered by re-checking the slot.
    pub fn acquire(&self) {
        let mut slot = self.slot.lock();
        while !*slot {
            self.ready.wait(&mut slot);
        }
        *slot = false;
    }

    /// Sets the slot and wakes exactly one waiter.
    pub fn release(&self) {
        {
            let mut slot = self.slot.lock();
            *slot = true;
        }
        self.ready.notify_one();
    }
}

// Non-blocking variants, used to observe the slot from tests.
#[cfg(test)]
impl HandoffSemaphore {
    /// Consumes the slot if it is set. Never blocks.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut slot = self.slot.lock();
        std::mem::replace(&mut *slot, false)
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`.
    ///
    /// Returns `true` if the slot was consumed.
    pub(crate) fn acquire_timeout(&self, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while !*slot {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        std::mem::replace(&mut *slot, false)
    }
}
