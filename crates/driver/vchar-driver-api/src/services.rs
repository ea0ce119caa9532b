//! Host service contracts for drivers.
//!
//! A driver receives these at load time and uses them instead of calling
//! into the host directly, so the same driver code runs against a real
//! kernel or an in-process simulation.

use alloc::sync::Arc;

use crate::devnum::DevRegion;
use crate::error::{CopyFault, HostError};
use crate::fops::FileOperations;
use crate::user::UserSlice;

/// Handle to an installed dispatch entry, returned by [`HostServices::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CdevHandle(pub u64);

/// Device-number registry and character-device dispatch table.
pub trait HostServices: Send + Sync {
    /// Allocates `count` device numbers under a dynamically chosen major,
    /// starting at minor `first_minor`. `name` is what the host lists for
    /// the range (e.g. in `/proc/devices`).
    fn alloc_region(
        &self,
        first_minor: u32,
        count: u32,
        name: &str,
    ) -> Result<DevRegion, HostError>;

    /// Returns a range obtained from [`alloc_region`](Self::alloc_region).
    ///
    /// Must be called exactly once per successful allocation, after every
    /// dispatch entry naming the range has been uninstalled.
    fn release_region(&self, region: DevRegion);

    /// Binds `fops` to every device number in `region`. From this point on
    /// clients can open the device.
    fn install(
        &self,
        region: DevRegion,
        fops: Arc<dyn FileOperations>,
    ) -> Result<CdevHandle, HostError>;

    /// Removes a dispatch entry installed by [`install`](Self::install).
    fn uninstall(&self, handle: CdevHandle);
}

/// The trusted user/kernel boundary copy primitive.
///
/// Both directions copy `min(user.len(), kernel.len())` bytes and return the
/// number copied, or a [`CopyFault`] if the user range is not accessible.
/// A fault may leave a partial copy in the destination.
pub trait UserCopy: Send + Sync {
    /// Copies kernel bytes `src` out to the user range `dst`.
    fn copy_to_user(&self, dst: UserSlice, src: &[u8]) -> Result<usize, CopyFault>;

    /// Copies the user range `src` into kernel memory `dst`.
    fn copy_from_user(&self, dst: &mut [u8], src: UserSlice) -> Result<usize, CopyFault>;
}
