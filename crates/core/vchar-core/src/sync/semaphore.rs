//! Counting semaphore with interruptible acquisition.
//!
//! A one-permit [`Semaphore`] is the exclusivity lock of a device: the task
//! that holds the permit owns the device until it releases it. Waiting for a
//! permit suspends the task (its waker is parked on the semaphore's
//! [`WaitQueue`]) rather than spinning, and an [`InterruptFlag`] can cancel
//! the wait.

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicU32, Ordering};
use core::task::{Context, Poll, Waker};

use super::{InterruptFlag, WaitQueue};

/// A counting semaphore with a fixed maximum number of permits.
///
/// # Example
///
/// ```ignore
/// let sem = Semaphore::new(1);
/// let permit = sem.acquire_interruptible(&signals).await?;
/// // ... exclusive section ...
/// drop(permit); // released
/// ```
pub struct Semaphore {
    permits: AtomicU32,
    max_permits: u32,
    waiters: WaitQueue,
}

/// Returned when an interruptible acquisition was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("wait interrupted")
    }
}

impl Semaphore {
    /// Creates a semaphore with `permits` permits, all available.
    pub const fn new(permits: u32) -> Self {
        Self {
            permits: AtomicU32::new(permits),
            max_permits: permits,
            waiters: WaitQueue::new(),
        }
    }

    /// Acquires a permit, suspending the task until one is available or
    /// `interrupt` is raised.
    ///
    /// A permit that is free when the future is first polled is taken even
    /// if an interruption is already pending; the interruption only cancels
    /// an actual wait.
    pub fn acquire_interruptible<'a>(
        &'a self,
        interrupt: &'a InterruptFlag,
    ) -> SemaphoreAcquireFuture<'a> {
        SemaphoreAcquireFuture {
            sem: self,
            interrupt,
            registered: None,
        }
    }

    /// Tries to take a permit without waiting.
    pub fn try_acquire(&self) -> Option<SemaphorePermit<'_>> {
        let mut current = self.permits.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return None;
            }
            match self.permits.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(SemaphorePermit { sem: self }),
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns the number of currently available permits.
    pub fn available_permits(&self) -> u32 {
        self.permits.load(Ordering::Relaxed)
    }

    /// Returns a permit previously detached with [`SemaphorePermit::forget`].
    ///
    /// Returns `false` and changes nothing if every permit is already
    /// available, so an unbalanced release can never raise the count above
    /// its initial value.
    pub fn release(&self) -> bool {
        let mut current = self.permits.load(Ordering::Relaxed);
        loop {
            if current >= self.max_permits {
                return false;
            }
            match self.permits.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        // Every waiter re-polls; at most one wins the permit. Waking only one
        // could hand the wakeup to a waiter that was interrupted meanwhile.
        self.waiters.wake_all();
        true
    }
}

/// Future returned by [`Semaphore::acquire_interruptible`].
///
/// Dropping the future before it completes withdraws its waker from both
/// queues.
pub struct SemaphoreAcquireFuture<'a> {
    sem: &'a Semaphore,
    interrupt: &'a InterruptFlag,
    registered: Option<Waker>,
}

impl SemaphoreAcquireFuture<'_> {
    fn deregister(&mut self) {
        if let Some(waker) = self.registered.take() {
            self.sem.waiters.remove(&waker);
            self.interrupt.deregister_waker(&waker);
        }
    }

    fn finish<T>(&mut self, out: T) -> Poll<T> {
        self.deregister();
        Poll::Ready(out)
    }
}

impl<'a> Future for SemaphoreAcquireFuture<'a> {
    type Output = Result<SemaphorePermit<'a>, Interrupted>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let sem = this.sem;
        let interrupt = this.interrupt;

        if let Some(permit) = sem.try_acquire() {
            return this.finish(Ok(permit));
        }
        if interrupt.is_raised() {
            return this.finish(Err(Interrupted));
        }

        // The task may have moved to another waker since the last poll.
        if !this
            .registered
            .as_ref()
            .is_some_and(|w| w.will_wake(cx.waker()))
        {
            this.deregister();
            this.registered = Some(cx.waker().clone());
        }

        // Register on both sources before re-checking, so a release or an
        // interrupt landing in between is not lost.
        sem.waiters.register_waker(cx.waker());
        interrupt.register_waker(cx.waker());

        if let Some(permit) = sem.try_acquire() {
            return this.finish(Ok(permit));
        }
        if interrupt.is_raised() {
            return this.finish(Err(Interrupted));
        }

        Poll::Pending
    }
}

impl Drop for SemaphoreAcquireFuture<'_> {
    fn drop(&mut self) {
        self.deregister();
    }
}

/// RAII permit that returns itself to the [`Semaphore`] on drop.
#[must_use = "dropping the permit releases it immediately"]
pub struct SemaphorePermit<'a> {
    sem: &'a Semaphore,
}

impl SemaphorePermit<'_> {
    /// Detaches the permit from this guard without releasing it.
    ///
    /// The owner becomes responsible for calling [`Semaphore::release`]
    /// exactly once.
    pub fn forget(self) {
        core::mem::forget(self);
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.sem.release();
    }
}
