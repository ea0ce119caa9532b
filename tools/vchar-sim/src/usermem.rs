//! Client address spaces.
//!
//! Each simulated client owns a small flat memory starting at user address
//! 0. The driver only reaches it through [`UserCopy`]; accesses outside the
//! mapped range fault.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{Result, bail};
use vchar_driver_api::{AddressSpaceId, CopyFault, UserCopy, UserSlice};

/// Bytes mapped for each client.
pub const CLIENT_MEMORY: usize = 4096;

/// All client address spaces, keyed by id.
#[derive(Default)]
pub struct SimUserMemory {
    spaces: Mutex<BTreeMap<AddressSpaceId, Vec<u8>>>,
}

impl SimUserMemory {
    /// Creates an empty set of address spaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a fresh zeroed address space of [`CLIENT_MEMORY`] bytes.
    pub fn map(&self, space: AddressSpaceId) {
        self.lock().insert(space, vec![0; CLIENT_MEMORY]);
    }

    /// Removes an address space; later copies into it fault, as after the
    /// client's buffer pages are unmapped.
    pub fn unmap(&self, space: AddressSpaceId) {
        self.lock().remove(&space);
    }

    /// Stores `bytes` at `addr` in `space`, as the client itself would.
    pub fn poke(&self, space: AddressSpaceId, addr: u64, bytes: &[u8]) -> Result<()> {
        let mut spaces = self.lock();
        let Some(mem) = spaces.get_mut(&space) else {
            bail!("address space {} is not mapped", space.0);
        };
        let Some(range) = span(mem.len(), addr, bytes.len()) else {
            bail!("{} bytes at {addr:#x} do not fit in client memory", bytes.len());
        };
        mem[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Loads `len` bytes at `addr` from `space`.
    pub fn peek(&self, space: AddressSpaceId, addr: u64, len: usize) -> Result<Vec<u8>> {
        let spaces = self.lock();
        let Some(mem) = spaces.get(&space) else {
            bail!("address space {} is not mapped", space.0);
        };
        let Some(range) = span(mem.len(), addr, len) else {
            bail!("{len} bytes at {addr:#x} do not fit in client memory");
        };
        Ok(mem[range].to_vec())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<AddressSpaceId, Vec<u8>>> {
        self.spaces
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Index range for `len` bytes at `addr` in a memory of `size` bytes.
fn span(size: usize, addr: u64, len: usize) -> Option<std::ops::Range<usize>> {
    let start = usize::try_from(addr).ok()?;
    let end = start.checked_add(len)?;
    (end <= size).then_some(start..end)
}

fn fault(slice: UserSlice) -> CopyFault {
    CopyFault {
        addr: usize::try_from(slice.addr()).unwrap_or(usize::MAX),
    }
}

impl UserCopy for SimUserMemory {
    fn copy_to_user(&self, dst: UserSlice, src: &[u8]) -> Result<usize, CopyFault> {
        let n = dst.len().min(src.len());
        if n == 0 {
            return Ok(0);
        }
        let mut spaces = self.lock();
        let mem = spaces.get_mut(&dst.space()).ok_or_else(|| fault(dst))?;
        let range = span(mem.len(), dst.addr(), n).ok_or_else(|| fault(dst))?;
        mem[range].copy_from_slice(&src[..n]);
        Ok(n)
    }

    fn copy_from_user(&self, dst: &mut [u8], src: UserSlice) -> Result<usize, CopyFault> {
        let n = dst.len().min(src.len());
        if n == 0 {
            return Ok(0);
        }
        let spaces = self.lock();
        let mem = spaces.get(&src.space()).ok_or_else(|| fault(src))?;
        let range = span(mem.len(), src.addr(), n).ok_or_else(|| fault(src))?;
        dst[..n].copy_from_slice(&mem[range]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: AddressSpaceId = AddressSpaceId(1);
    const B: AddressSpaceId = AddressSpaceId(2);

    #[test]
    fn spaces_are_isolated() {
        let mem = SimUserMemory::new();
        mem.map(A);
        mem.map(B);
        mem.poke(A, 0, b"alpha").unwrap();

        assert_eq!(mem.peek(A, 0, 5).unwrap(), b"alpha");
        assert_eq!(mem.peek(B, 0, 5).unwrap(), [0; 5]);
    }

    #[test]
    fn copies_move_min_length() {
        let mem = SimUserMemory::new();
        mem.map(A);
        let dst = UserSlice::new(A, 16, 3).unwrap();
        assert_eq!(mem.copy_to_user(dst, b"abcdef"), Ok(3));
        assert_eq!(mem.peek(A, 16, 4).unwrap(), b"abc\0");

        let mut buf = [0u8; 8];
        assert_eq!(mem.copy_from_user(&mut buf, dst), Ok(3));
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn out_of_range_and_unmapped_fault() {
        let mem = SimUserMemory::new();
        mem.map(A);
        let past_end = UserSlice::new(A, CLIENT_MEMORY as u64 - 2, 4).unwrap();
        assert_eq!(
            mem.copy_to_user(past_end, b"xxxx"),
            Err(CopyFault {
                addr: CLIENT_MEMORY - 2
            })
        );

        let unmapped = UserSlice::new(B, 0, 1).unwrap();
        let mut buf = [0u8; 1];
        assert!(mem.copy_from_user(&mut buf, unmapped).is_err());

        mem.unmap(A);
        assert!(mem.peek(A, 0, 1).is_err());
        let was_mapped = UserSlice::new(A, 0, 1).unwrap();
        assert!(mem.copy_to_user(was_mapped, b"x").is_err());
    }

    #[test]
    fn empty_copies_never_fault() {
        let mem = SimUserMemory::new();
        mem.map(A);
        let beyond = UserSlice::new(A, 2 * CLIENT_MEMORY as u64, 0).unwrap();
        assert_eq!(mem.copy_to_user(beyond, b"abc"), Ok(0));
        assert_eq!(mem.copy_from_user(&mut [0u8; 4], beyond), Ok(0));

        let unmapped = UserSlice::new(B, 0, 4).unwrap();
        assert_eq!(mem.copy_to_user(unmapped, b""), Ok(0));
        assert_eq!(mem.copy_from_user(&mut [], unmapped), Ok(0));
    }
}
