//! Opening and closing the device.
//!
//! The exclusivity lock is taken on open and held for the whole session.
//! Once the session is recorded the permit is forgotten; `close` hands it
//! back explicitly after checking the caller's token.

use vchar_core::sync::InterruptFlag;
use vchar_core::{kdebug, kinfo, kwarn};
use vchar_driver_api::{DriverError, OpenFlags, SessionToken};

use crate::file::FakeDevice;

impl FakeDevice {
    /// Opens the device, waiting for the current holder to close it.
    ///
    /// The wait ends early with [`DriverError::BusyOrInterrupted`] if
    /// `signals` is raised. With [`OpenFlags::NONBLOCK`] a held device fails
    /// at once with the same error.
    pub async fn open(
        &self,
        flags: OpenFlags,
        signals: &InterruptFlag,
    ) -> Result<SessionToken, DriverError> {
        let permit = if flags.contains(OpenFlags::NONBLOCK) {
            match self.state.lock.try_acquire() {
                Some(permit) => permit,
                None => {
                    kdebug!("{}: device busy, non-blocking open refused", self.name);
                    return Err(DriverError::BusyOrInterrupted);
                }
            }
        } else {
            match self.state.lock.acquire_interruptible(signals).await {
                Ok(permit) => permit,
                Err(_) => {
                    kwarn!("{}: could not lock device during open", self.name);
                    return Err(DriverError::BusyOrInterrupted);
                }
            }
        };

        // On error the permit drops here and the lock is free again.
        let token = self.state.begin_session(flags)?;
        permit.forget();
        kinfo!("{}: opened device ({})", self.name, token);
        Ok(token)
    }

    /// Ends the session named by `token` and lets the next waiter in.
    pub fn close(&self, token: SessionToken) -> Result<(), DriverError> {
        if let Err(err) = self.state.end_session(&token) {
            kwarn!("{}: close with stale {}", self.name, token);
            return Err(err);
        }
        self.state.lock.release();
        kinfo!("{}: closed device ({})", self.name, token);
        Ok(())
    }
}
