//! Blocking sync-async bridge for client threads.
//!
//! Each simulated client is an OS thread. [`block_on`] polls a future on
//! that thread and parks it between polls; the future's waker unparks it.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

struct Unparker(Thread);

impl Wake for Unparker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

/// Polls `future` to completion on the current thread.
///
/// A wake that arrives between a `Pending` poll and the park is not lost:
/// the unpark token makes the park return immediately.
pub fn block_on<T>(future: impl Future<Output = T>) -> T {
    let waker = Waker::from(Arc::new(Unparker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    let mut future = pin!(future);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(val) => return val,
            Poll::Pending => thread::park(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use vchar_core::sync::Semaphore;

    use super::*;

    #[test]
    fn ready_future_returns_immediately() {
        assert_eq!(block_on(async { 7 }), 7);
    }

    #[test]
    fn woken_from_another_thread() {
        let sem = Arc::new(Semaphore::new(1));
        sem.try_acquire().unwrap().forget();
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || {
                let signals = vchar_core::sync::InterruptFlag::new();
                let permit = block_on(sem.acquire_interruptible(&signals)).unwrap();
                permit.forget();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        sem.release();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }
}
