//! Open sessions: access flags and the token naming a session.

use core::fmt;
use core::num::NonZeroU64;

bitflags::bitflags! {
    /// Flags a client passes to `open`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// The session may read the device.
        const READ = 1 << 0;
        /// The session may write the device.
        const WRITE = 1 << 1;
        /// Fail instead of waiting when the device is held.
        const NONBLOCK = 1 << 2;
        /// Read and write access.
        const RDWR = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Opaque token returned by a successful open.
///
/// The host keeps it with the open file and hands it back on every call for
/// that file. It is deliberately neither `Clone` nor `Copy`: `release`
/// consumes it, so a closed session cannot be presented again.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SessionToken(NonZeroU64);

impl SessionToken {
    /// Wraps a raw session id; `0` is reserved for "no session".
    pub const fn from_raw(id: u64) -> Option<Self> {
        match NonZeroU64::new(id) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// The raw session id.
    pub const fn id(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}
