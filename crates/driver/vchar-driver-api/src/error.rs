//! Driver error types.
//!
//! [`DriverError`] is what driver operations report to the host. The host's
//! own failures ([`HostError`]) and boundary-copy faults ([`CopyFault`]) are
//! separate types the driver maps into it.

use core::fmt;

/// Errno numbers (positive, as in `<errno.h>`) used by [`DriverError::errno`].
pub mod errno {
    /// Bad file descriptor.
    pub const EBADF: i32 = 9;
    /// Interrupted system call.
    pub const EINTR: i32 = 4;
    /// Out of memory.
    pub const ENOMEM: i32 = 12;
    /// Bad address.
    pub const EFAULT: i32 = 14;
    /// Device or resource busy.
    pub const EBUSY: i32 = 16;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
}

/// Errors that can occur during driver operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The host registry could not allocate a device-number range.
    Resource,
    /// Installing the file operations against the range failed.
    Install,
    /// The exclusivity lock was not acquired: the wait was interrupted, or
    /// a non-blocking open found the device held.
    BusyOrInterrupted,
    /// The user/kernel boundary copy faulted.
    Transfer,
    /// The presented session token does not name the active session.
    NotOwner,
    /// The session was not opened with the access this call needs.
    BadMode,
    /// The driver configuration is invalid.
    InvalidArgument,
}

impl DriverError {
    /// Returns the (negative) errno a syscall layer should report.
    pub const fn errno(self) -> i32 {
        let code = match self {
            Self::Resource => errno::EBUSY,
            Self::Install => errno::ENOMEM,
            Self::BusyOrInterrupted => errno::EINTR,
            Self::Transfer => errno::EFAULT,
            Self::NotOwner | Self::BadMode => errno::EBADF,
            Self::InvalidArgument => errno::EINVAL,
        };
        -code
    }

    /// Returns `true` for errors a caller may sensibly retry.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::BusyOrInterrupted | Self::Transfer)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource => f.write_str("device number range unavailable"),
            Self::Install => f.write_str("failed to install device operations"),
            Self::BusyOrInterrupted => f.write_str("device busy or wait interrupted"),
            Self::Transfer => f.write_str("user buffer fault"),
            Self::NotOwner => f.write_str("session does not hold the device"),
            Self::BadMode => f.write_str("session not opened for this access"),
            Self::InvalidArgument => f.write_str("invalid argument"),
        }
    }
}

/// Failures reported by [`HostServices`](crate::HostServices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    /// No free device numbers remain.
    Exhausted,
    /// The requested numbers are already taken.
    Busy,
    /// The host ran out of memory for its bookkeeping.
    OutOfMemory,
    /// The request itself was malformed.
    Invalid,
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => f.write_str("no free device numbers"),
            Self::Busy => f.write_str("device numbers already in use"),
            Self::OutOfMemory => f.write_str("out of memory"),
            Self::Invalid => f.write_str("invalid request"),
        }
    }
}

/// A user-space access faulted during a boundary copy.
///
/// Carries the address that could not be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyFault {
    /// First user address that could not be accessed.
    pub addr: usize,
}

impl fmt::Display for CopyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user access fault at {:#x}", self.addr)
    }
}
