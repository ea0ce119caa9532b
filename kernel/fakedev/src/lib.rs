//! Fake character device with exclusive access.
//!
//! One device backed by a fixed [`BUFFER_CAPACITY`]-byte buffer. Only one
//! client may have it open at a time; further opens wait (interruptibly)
//! until the holder closes it. Reads and writes always start at offset 0.
//!
//! The module is loaded with [`Registration::start`], which registers the
//! device with the host and installs a [`FakeDevice`] as its file
//! operations, and unloaded with [`Registration::stop`]:
//!
//! ```ignore
//! let reg = Registration::start(host, user_copy, &DeviceConfig::default())?;
//! // ... clients open /dev/testCharDevice through the host ...
//! reg.stop();
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod config;
mod device;
mod file;
mod lifecycle;
mod registration;
mod transfer;

#[cfg(test)]
mod mock;

pub use config::{DeviceConfig, MAX_NAME_LEN};
pub use file::FakeDevice;
pub use registration::Registration;

use vchar_driver_api::ModuleInfo;

/// Size of the device buffer in bytes.
pub const BUFFER_CAPACITY: usize = 100;

/// Metadata reported at load time.
pub const MODULE_INFO: ModuleInfo = ModuleInfo {
    name: "vchar-fakedev",
    license: "GPL",
    author: "Tas Devil",
    description: "Kernel module for character device",
};
