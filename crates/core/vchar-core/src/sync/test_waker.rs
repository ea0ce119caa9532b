//! Wakers for polling futures in host-side unit tests without an executor.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Wake, Waker};

/// Returns a [`Waker`] that does nothing when woken.
pub fn noop_waker() -> Waker {
    Waker::noop().clone()
}

struct CountingWake(AtomicUsize);

impl Wake for CountingWake {
    fn wake(self: Arc<Self>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A [`Waker`] that counts how many times it has been woken.
pub struct CountingWaker {
    inner: Arc<CountingWake>,
    waker: Waker,
}

impl CountingWaker {
    /// The waker to hand to a [`Context`](std::task::Context).
    pub fn waker(&self) -> &Waker {
        &self.waker
    }

    /// Number of wake calls observed so far.
    pub fn count(&self) -> usize {
        self.inner.0.load(Ordering::SeqCst)
    }
}

/// Creates a fresh [`CountingWaker`] with a zero count.
pub fn counting_waker() -> CountingWaker {
    let inner = Arc::new(CountingWake(AtomicUsize::new(0)));
    let waker = Waker::from(inner.clone());
    CountingWaker { inner, waker }
}
