//! File operations a character driver installs with the host.

use alloc::boxed::Box;
use core::future::Future;
use core::pin::Pin;

use vchar_core::sync::InterruptFlag;

use crate::error::DriverError;
use crate::session::{OpenFlags, SessionToken};
use crate::user::UserSlice;

/// Future returned by [`FileOperations::open`].
pub type OpenFuture<'a> =
    Pin<Box<dyn Future<Output = Result<SessionToken, DriverError>> + Send + 'a>>;

/// Callbacks the host dispatches to for an installed device.
///
/// `open` may suspend the calling task (for instance while another client
/// holds the device); the host drives it on its executor and raises the
/// client's [`InterruptFlag`] to cancel the wait. The remaining operations
/// never block.
pub trait FileOperations: Send + Sync {
    /// Opens the device for the client owning `signals`.
    fn open<'a>(&'a self, flags: OpenFlags, signals: &'a InterruptFlag) -> OpenFuture<'a>;

    /// Closes the session named by `token`.
    fn release(&self, token: SessionToken) -> Result<(), DriverError>;

    /// Reads device data into the user range `dst`. Returns bytes copied.
    fn read(&self, token: &SessionToken, dst: UserSlice) -> Result<usize, DriverError>;

    /// Writes the user range `src` into the device. Returns bytes copied.
    fn write(&self, token: &SessionToken, src: UserSlice) -> Result<usize, DriverError>;
}
