//! Per-client interruption signal.
//!
//! An [`InterruptFlag`] plays the role of a task's pending-signal set for
//! blocking waits: raising it wakes every future waiting on it, and those
//! futures complete with an error instead of continuing to wait.

use core::sync::atomic::{AtomicBool, Ordering};
use core::task::Waker;

use super::WaitQueue;

/// A latch that cancels interruptible waits.
pub struct InterruptFlag {
    pending: AtomicBool,
    waiters: WaitQueue,
}

impl Default for InterruptFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptFlag {
    /// Creates a flag with no interruption pending.
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            waiters: WaitQueue::new(),
        }
    }

    /// Marks an interruption as pending and wakes all registered waiters.
    ///
    /// Safe to call from any thread.
    pub fn raise(&self) {
        self.pending.store(true, Ordering::Release);
        self.waiters.wake_all();
    }

    /// Returns `true` while an interruption is pending.
    pub fn is_raised(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Consumes a pending interruption, returning whether one was pending.
    pub fn clear(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Registers `waker` to be woken by the next [`raise`](Self::raise).
    pub fn register_waker(&self, waker: &Waker) {
        self.waiters.register_waker(waker);
    }

    /// Withdraws a waker registered by a wait that ended without an
    /// interruption.
    pub fn deregister_waker(&self, waker: &Waker) {
        self.waiters.remove(waker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Semaphore;
    use crate::sync::test_waker::counting_waker;
    use core::future::Future;
    use core::pin::Pin;
    use core::task::{Context, Poll};

    #[test]
    fn raise_wakes_registered_waiters() {
        let flag = InterruptFlag::new();
        let w = counting_waker();
        flag.register_waker(w.waker());
        assert!(!flag.is_raised());

        flag.raise();
        assert!(flag.is_raised());
        assert_eq!(w.count(), 1);
    }

    #[test]
    fn finished_waits_leave_no_waker_behind() {
        let sem = Semaphore::new(1);
        let flag = InterruptFlag::new();

        for _ in 0..50 {
            let holder = sem.try_acquire().unwrap();
            // A fresh waker per wait, as a new task would present.
            let w = counting_waker();
            let mut cx = Context::from_waker(w.waker());
            let mut fut = sem.acquire_interruptible(&flag);
            assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
            assert_eq!(flag.waiters.len(), 1);

            drop(holder);
            let permit = match Pin::new(&mut fut).poll(&mut cx) {
                Poll::Ready(Ok(permit)) => permit,
                _ => panic!("released permit was not acquired"),
            };
            drop(permit);
        }
        assert!(flag.waiters.is_empty());
        assert!(!flag.is_raised());
    }

    #[test]
    fn abandoned_wait_deregisters() {
        let sem = Semaphore::new(1);
        let flag = InterruptFlag::new();
        let _holder = sem.try_acquire().unwrap();

        for _ in 0..10 {
            let w = counting_waker();
            let mut fut = sem.acquire_interruptible(&flag);
            assert!(Pin::new(&mut fut).poll(&mut Context::from_waker(w.waker())).is_pending());
            drop(fut);
        }
        assert!(flag.waiters.is_empty());

        // A later raise has nobody stale to wake.
        flag.raise();
        assert!(flag.is_raised());
    }

    #[test]
    fn clear_consumes_pending_interrupt() {
        let flag = InterruptFlag::new();
        assert!(!flag.clear());
        flag.raise();
        assert!(flag.clear());
        assert!(!flag.is_raised());
    }
}
