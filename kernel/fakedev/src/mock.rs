//! In-crate host doubles for unit tests.

use std::future::Future;
use std::pin::pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

use vchar_driver_api::{
    AddressSpaceId, CdevHandle, CopyFault, DevNum, DevRegion, FileOperations, HostError,
    HostServices, UserCopy, UserSlice,
};

use crate::file::FakeDevice;

pub const SPACE: AddressSpaceId = AddressSpaceId(1);
pub const MAJOR: u32 = 240;

/// Host registry double recording every call in order.
#[derive(Default)]
pub struct MockHost {
    pub fail_alloc: bool,
    pub fail_install: bool,
    pub calls: Mutex<Vec<String>>,
    pub allocated: Mutex<Vec<DevRegion>>,
    pub installed: Mutex<Vec<(CdevHandle, Arc<dyn FileOperations>)>>,
}

impl MockHost {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl HostServices for MockHost {
    fn alloc_region(
        &self,
        first_minor: u32,
        count: u32,
        name: &str,
    ) -> Result<DevRegion, HostError> {
        self.record(format!("alloc {name}"));
        if self.fail_alloc {
            return Err(HostError::Exhausted);
        }
        let first = DevNum::new(MAJOR, first_minor).ok_or(HostError::Invalid)?;
        let region = DevRegion::new(first, count).ok_or(HostError::Invalid)?;
        self.allocated.lock().unwrap().push(region);
        Ok(region)
    }

    fn release_region(&self, region: DevRegion) {
        self.record(format!("release {region}"));
        self.allocated.lock().unwrap().retain(|r| *r != region);
    }

    fn install(
        &self,
        region: DevRegion,
        fops: Arc<dyn FileOperations>,
    ) -> Result<CdevHandle, HostError> {
        self.record(format!("install {region}"));
        if self.fail_install {
            return Err(HostError::OutOfMemory);
        }
        let handle = CdevHandle(u64::from(region.first().as_raw()));
        self.installed.lock().unwrap().push((handle, fops));
        Ok(handle)
    }

    fn uninstall(&self, handle: CdevHandle) {
        self.record(format!("uninstall {}", handle.0));
        self.installed.lock().unwrap().retain(|(h, _)| *h != handle);
    }
}

/// One flat address space of `len` bytes starting at address 0; anything
/// past the end faults.
pub struct MockUser {
    pub memory: Mutex<Vec<u8>>,
}

impl MockUser {
    pub fn new(len: usize) -> Arc<Self> {
        Arc::new(Self {
            memory: Mutex::new(vec![0; len]),
        })
    }

    pub fn poke(&self, addr: usize, bytes: &[u8]) {
        self.memory.lock().unwrap()[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    pub fn peek(&self, addr: usize, len: usize) -> Vec<u8> {
        self.memory.lock().unwrap()[addr..addr + len].to_vec()
    }

    fn range(&self, slice: UserSlice, len: usize) -> Result<std::ops::Range<usize>, CopyFault> {
        let start = usize::try_from(slice.addr()).map_err(|_| CopyFault { addr: usize::MAX })?;
        let mem_len = self.memory.lock().unwrap().len();
        if slice.space() != SPACE || start + len > mem_len {
            return Err(CopyFault { addr: start });
        }
        Ok(start..start + len)
    }
}

impl UserCopy for MockUser {
    fn copy_to_user(&self, dst: UserSlice, src: &[u8]) -> Result<usize, CopyFault> {
        let n = dst.len().min(src.len());
        let range = self.range(dst, n)?;
        self.memory.lock().unwrap()[range].copy_from_slice(&src[..n]);
        Ok(n)
    }

    fn copy_from_user(&self, dst: &mut [u8], src: UserSlice) -> Result<usize, CopyFault> {
        let n = dst.len().min(src.len());
        let range = self.range(src, n)?;
        dst[..n].copy_from_slice(&self.memory.lock().unwrap()[range]);
        Ok(n)
    }
}

pub fn slice(addr: u64, len: usize) -> UserSlice {
    UserSlice::new(SPACE, addr, len).unwrap()
}

/// A device wired to a fresh [`MockUser`], without going through registration.
pub fn device() -> (Arc<FakeDevice>, Arc<MockUser>) {
    let user = MockUser::new(4096);
    let region = DevRegion::new(DevNum::new(MAJOR, 0).unwrap(), 1).unwrap();
    let device = Arc::new(FakeDevice::new("testCharDevice".into(), region, user.clone()));
    (device, user)
}

struct ThreadWaker(Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }
}

/// Polls `future` to completion, parking the thread between polls.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    let mut future = pin!(future);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(out) => return out,
            Poll::Pending => thread::park(),
        }
    }
}

/// Polls `future` exactly once with a no-op waker.
pub fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
    let mut cx = Context::from_waker(Waker::noop());
    std::pin::Pin::new(future).poll(&mut cx)
}
