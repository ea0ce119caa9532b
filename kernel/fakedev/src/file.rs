//! The file-operations object installed with the host.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;

use vchar_core::sync::InterruptFlag;
use vchar_driver_api::{
    DevRegion, DriverError, FileOperations, OpenFlags, OpenFuture, SessionToken, UserCopy,
    UserSlice,
};

use crate::device::DeviceState;

/// The loaded device: its state plus what it needs to serve clients.
///
/// Open/close live in `lifecycle.rs`, read/write in `transfer.rs`.
pub struct FakeDevice {
    pub(crate) name: String,
    pub(crate) region: DevRegion,
    pub(crate) state: DeviceState,
    pub(crate) user: Arc<dyn UserCopy>,
}

impl FakeDevice {
    pub(crate) fn new(name: String, region: DevRegion, user: Arc<dyn UserCopy>) -> Self {
        Self {
            name,
            region,
            state: DeviceState::new(),
            user,
        }
    }

    /// Name the device was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device numbers the device answers to.
    pub fn region(&self) -> DevRegion {
        self.region
    }

    /// Returns `true` while some client has the device open.
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }
}

impl FileOperations for FakeDevice {
    fn open<'a>(&'a self, flags: OpenFlags, signals: &'a InterruptFlag) -> OpenFuture<'a> {
        Box::pin(FakeDevice::open(self, flags, signals))
    }

    fn release(&self, token: SessionToken) -> Result<(), DriverError> {
        self.close(token)
    }

    fn read(&self, token: &SessionToken, dst: UserSlice) -> Result<usize, DriverError> {
        FakeDevice::read(self, token, dst)
    }

    fn write(&self, token: &SessionToken, src: UserSlice) -> Result<usize, DriverError> {
        FakeDevice::write(self, token, src)
    }
}
