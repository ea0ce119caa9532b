//! Device state: the buffer, the exclusivity lock and the session record.

use core::sync::atomic::{AtomicU64, Ordering};

use vchar_core::sync::{Semaphore, SpinLock};
use vchar_driver_api::{DriverError, OpenFlags, SessionToken};

use crate::BUFFER_CAPACITY;

/// The session currently holding the exclusivity lock.
#[derive(Debug, Clone, Copy)]
struct ActiveSession {
    id: u64,
    flags: OpenFlags,
}

/// State shared by every open of the device.
///
/// `lock` admits one holder; `holder` records which session that is. The
/// buffer has its own spin lock so the bytes are never torn, but only the
/// lock holder ever reaches it.
pub(crate) struct DeviceState {
    data: SpinLock<[u8; BUFFER_CAPACITY]>,
    pub(crate) lock: Semaphore,
    holder: SpinLock<Option<ActiveSession>>,
    next_id: AtomicU64,
}

impl DeviceState {
    /// Zeroed buffer, lock available, no session.
    pub(crate) const fn new() -> Self {
        Self {
            data: SpinLock::new([0; BUFFER_CAPACITY]),
            lock: Semaphore::new(1),
            holder: SpinLock::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Records a new session for the task that just took `lock`.
    ///
    /// Fails if a session is already recorded, which would mean the lock
    /// admitted two holders.
    pub(crate) fn begin_session(&self, flags: OpenFlags) -> Result<SessionToken, DriverError> {
        let mut holder = self.holder.lock();
        if holder.is_some() {
            return Err(DriverError::BusyOrInterrupted);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = SessionToken::from_raw(id).ok_or(DriverError::BusyOrInterrupted)?;
        *holder = Some(ActiveSession { id, flags });
        Ok(token)
    }

    /// Clears the session named by `token`.
    pub(crate) fn end_session(&self, token: &SessionToken) -> Result<(), DriverError> {
        let mut holder = self.holder.lock();
        match *holder {
            Some(active) if active.id == token.id() => {
                *holder = None;
                Ok(())
            }
            _ => Err(DriverError::NotOwner),
        }
    }

    /// Checks that `token` names the active session and that it was opened
    /// with `access`.
    pub(crate) fn check_access(
        &self,
        token: &SessionToken,
        access: OpenFlags,
    ) -> Result<(), DriverError> {
        match *self.holder.lock() {
            Some(active) if active.id == token.id() => {
                if active.flags.contains(access) {
                    Ok(())
                } else {
                    Err(DriverError::BadMode)
                }
            }
            _ => Err(DriverError::NotOwner),
        }
    }

    /// Returns `true` while a session is open.
    pub(crate) fn is_open(&self) -> bool {
        self.holder.lock().is_some()
    }

    /// Copy of the whole buffer.
    pub(crate) fn snapshot(&self) -> [u8; BUFFER_CAPACITY] {
        *self.data.lock()
    }

    /// Overwrites the buffer from offset 0; bytes past `bytes.len()` keep
    /// their previous value.
    pub(crate) fn store(&self, bytes: &[u8]) {
        let len = bytes.len().min(BUFFER_CAPACITY);
        self.data.lock()[..len].copy_from_slice(&bytes[..len]);
    }
}
