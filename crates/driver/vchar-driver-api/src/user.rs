//! User-space buffer descriptors.
//!
//! A [`UserSlice`] is what a client hands the driver instead of a pointer:
//! an address range inside one client's address space. Constructing one
//! only checks that the range lies in the user half and does not overflow;
//! whether the memory is actually mapped is discovered by the
//! [`UserCopy`](crate::UserCopy) primitive, which reports a
//! [`CopyFault`] if it is not.

use core::fmt;

use crate::error::CopyFault;

/// Upper bound (exclusive) of user-space addresses.
///
/// Addresses at or above this belong to the kernel half.
pub const USER_ADDR_MAX: u64 = 0x0000_8000_0000_0000;

/// Identifies the address space a [`UserSlice`] lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressSpaceId(pub u32);

impl fmt::Display for AddressSpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "as{}", self.0)
    }
}

/// A validated user-space byte range `[addr, addr + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSlice {
    space: AddressSpaceId,
    addr: u64,
    len: usize,
}

impl UserSlice {
    /// Validates a user range.
    ///
    /// Fails with a [`CopyFault`] at the first offending address if any byte
    /// of the range falls outside user space or the range overflows.
    pub fn new(space: AddressSpaceId, addr: u64, len: usize) -> Result<Self, CopyFault> {
        if len == 0 {
            return Ok(Self { space, addr, len });
        }
        let fault = CopyFault {
            addr: usize::try_from(addr).unwrap_or(usize::MAX),
        };
        let len64 = u64::try_from(len).map_err(|_| fault)?;
        let end = addr.checked_add(len64).ok_or(fault)?;
        if end > USER_ADDR_MAX {
            return Err(fault);
        }
        Ok(Self { space, addr, len })
    }

    /// The address space this range belongs to.
    pub const fn space(&self) -> AddressSpaceId {
        self.space
    }

    /// The first user address.
    pub const fn addr(&self) -> u64 {
        self.addr
    }

    /// Length in bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the range is empty.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the leading `max` bytes of the range (or all of it if shorter).
    #[must_use]
    pub const fn prefix(self, max: usize) -> Self {
        let len = if self.len < max { self.len } else { max };
        Self { len, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AS: AddressSpaceId = AddressSpaceId(1);

    #[test]
    fn valid_low_range() {
        let slice = UserSlice::new(AS, 0x1000, 4096).unwrap();
        assert_eq!(slice.addr(), 0x1000);
        assert_eq!(slice.len(), 4096);
        assert_eq!(slice.space(), AS);
    }

    #[test]
    fn empty_range_always_valid() {
        assert!(UserSlice::new(AS, u64::MAX, 0).unwrap().is_empty());
    }

    #[test]
    fn rejects_kernel_half() {
        assert!(UserSlice::new(AS, USER_ADDR_MAX - 10, 20).is_err());
        assert!(UserSlice::new(AS, USER_ADDR_MAX - 10, 10).is_ok());
    }

    #[test]
    fn rejects_overflow() {
        assert!(UserSlice::new(AS, u64::MAX, 1).is_err());
    }

    #[test]
    fn prefix_clamps_length() {
        let slice = UserSlice::new(AS, 0x2000, 150).unwrap();
        assert_eq!(slice.prefix(100).len(), 100);
        assert_eq!(slice.prefix(100).addr(), 0x2000);
        assert_eq!(slice.prefix(500).len(), 150);
    }
}
