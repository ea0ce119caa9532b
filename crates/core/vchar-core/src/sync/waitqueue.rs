//! Heap-backed queue of task wakers.
//!
//! Tasks that cannot make progress register their [`Waker`] here; whoever
//! changes the awaited condition calls [`WaitQueue::wake_all`]. A task that
//! stops waiting without being woken takes its waker back out with
//! [`WaitQueue::remove`]. Wakers are always invoked outside the internal lock
//! so a woken task may immediately re-register.

use alloc::collections::VecDeque;
use core::task::Waker;

use super::SpinLock;

/// A FIFO queue of [`Waker`]s waiting for an event.
pub struct WaitQueue {
    waiters: SpinLock<VecDeque<Waker>>,
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitQueue {
    /// Creates an empty wait queue.
    pub const fn new() -> Self {
        Self {
            waiters: SpinLock::new(VecDeque::new()),
        }
    }

    /// Registers `waker` unless an equivalent waker is already queued.
    ///
    /// A future that is polled repeatedly while pending re-registers on every
    /// poll; deduplication keeps the queue bounded by the number of distinct
    /// waiting tasks.
    pub fn register_waker(&self, waker: &Waker) {
        let mut waiters = self.waiters.lock();
        if !waiters.iter().any(|w| w.will_wake(waker)) {
            waiters.push_back(waker.clone());
        }
    }

    /// Drops every queued waker that would wake the same task as `waker`.
    pub fn remove(&self, waker: &Waker) {
        self.waiters.lock().retain(|w| !w.will_wake(waker));
    }

    /// Wakes every waiter currently queued.
    pub fn wake_all(&self) {
        let drained = core::mem::take(&mut *self.waiters.lock());
        for waker in drained {
            waker.wake();
        }
    }

    /// Number of queued waiters.
    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Returns `true` if nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::test_waker::{counting_waker, noop_waker};

    #[test]
    fn duplicate_registration_is_ignored() {
        let wq = WaitQueue::new();
        let w = counting_waker();
        wq.register_waker(w.waker());
        wq.register_waker(w.waker());
        assert_eq!(wq.len(), 1);
    }

    #[test]
    fn remove_takes_out_only_that_task() {
        let wq = WaitQueue::new();
        let first = counting_waker();
        let second = counting_waker();
        wq.register_waker(first.waker());
        wq.register_waker(second.waker());

        wq.remove(first.waker());
        assert_eq!(wq.len(), 1);
        wq.remove(first.waker());
        assert_eq!(wq.len(), 1);

        wq.wake_all();
        assert_eq!(first.count(), 0);
        assert_eq!(second.count(), 1);
    }

    #[test]
    fn wake_all_drains_queue() {
        let wq = WaitQueue::new();
        let a = counting_waker();
        let b = counting_waker();
        wq.register_waker(a.waker());
        wq.register_waker(b.waker());

        wq.wake_all();
        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 1);
        assert!(wq.is_empty());
    }

    #[test]
    fn waking_empty_queue_is_harmless() {
        let wq = WaitQueue::new();
        wq.wake_all();
        wq.remove(&noop_waker());
        wq.register_waker(&noop_waker());
        assert_eq!(wq.len(), 1);
    }
}
