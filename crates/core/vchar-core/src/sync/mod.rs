//! Synchronization primitives.
//!
//! [`SpinLock`] guards short critical sections, [`WaitQueue`] parks task
//! wakers, and [`Semaphore`] builds the blocking-but-interruptible
//! exclusivity lock on top of both. [`InterruptFlag`] is the per-client
//! signal that cancels a pending acquisition.

mod interrupt;
mod semaphore;
mod spinlock;
mod waitqueue;

#[cfg(test)]
pub(crate) mod test_waker;

pub use interrupt::InterruptFlag;
pub use semaphore::{Interrupted, Semaphore, SemaphoreAcquireFuture, SemaphorePermit};
pub use spinlock::{SpinLock, SpinLockGuard};
pub use waitqueue::WaitQueue;
