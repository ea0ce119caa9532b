//! Driver/host contract for vchar character devices.
//!
//! The driver never talks to the host operating system directly. Everything
//! it needs is described here:
//!
//! - [`HostServices`] -- device-number registry and dispatch table.
//! - [`UserCopy`] -- the user/kernel boundary copy primitive.
//! - [`FileOperations`] -- what the driver installs for the host to call.
//! - [`DriverError`] -- the error taxonomy every operation reports.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod devnum;
pub mod error;
pub mod fops;
pub mod info;
pub mod services;
pub mod session;
pub mod user;

// Re-export all public types at the crate root for ergonomic imports.
pub use devnum::{DevNum, DevRegion};
pub use error::{CopyFault, DriverError, HostError};
pub use fops::{FileOperations, OpenFuture};
pub use info::ModuleInfo;
pub use services::{CdevHandle, HostServices, UserCopy};
pub use session::{OpenFlags, SessionToken};
pub use user::{AddressSpaceId, UserSlice};
