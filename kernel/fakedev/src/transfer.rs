//! Reading and writing the device buffer.
//!
//! Every transfer starts at offset 0 of the buffer and moves at most
//! [`BUFFER_CAPACITY`] bytes. There is no file position and no end-of-file:
//! a read always returns the first `min(len, capacity)` bytes.

use vchar_core::{kdebug, kwarn};
use vchar_driver_api::{DriverError, OpenFlags, SessionToken, UserSlice};

use crate::BUFFER_CAPACITY;
use crate::file::FakeDevice;

impl FakeDevice {
    /// Copies the start of the buffer out to `dst`.
    ///
    /// Returns the number of bytes copied. A fault while copying out fails
    /// with [`DriverError::Transfer`].
    pub fn read(&self, token: &SessionToken, dst: UserSlice) -> Result<usize, DriverError> {
        self.state.check_access(token, OpenFlags::READ)?;
        let dst = dst.prefix(BUFFER_CAPACITY);
        let snapshot = self.state.snapshot();

        match self.user.copy_to_user(dst, &snapshot[..dst.len()]) {
            Ok(n) => {
                kdebug!("{}: read {} bytes", self.name, n);
                Ok(n)
            }
            Err(fault) => {
                kwarn!("{}: failed to send data to user: {}", self.name, fault);
                Err(DriverError::Transfer)
            }
        }
    }

    /// Copies `src` into the start of the buffer.
    ///
    /// Bytes beyond what is written keep their old contents. The buffer is
    /// only touched once the whole copy-in has succeeded.
    pub fn write(&self, token: &SessionToken, src: UserSlice) -> Result<usize, DriverError> {
        self.state.check_access(token, OpenFlags::WRITE)?;
        let src = src.prefix(BUFFER_CAPACITY);
        let mut scratch = [0u8; BUFFER_CAPACITY];

        match self.user.copy_from_user(&mut scratch[..src.len()], src) {
            Ok(n) => {
                self.state.store(&scratch[..n]);
                kdebug!("{}: wrote {} bytes", self.name, n);
                Ok(n)
            }
            Err(fault) => {
                kwarn!("{}: failed to receive data from user: {}", self.name, fault);
                Err(DriverError::Transfer)
            }
        }
    }
}
