//! Simulated user processes.
//!
//! Each [`Client`] runs on its own thread with its own address space and
//! interrupt flag, and performs one operation at a time on request. An
//! operation that does not answer within the caller's wait is reported as
//! blocked; its answer can be collected later with [`Client::wait`].

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use vchar_core::sync::InterruptFlag;
use vchar_driver_api::{
    AddressSpaceId, DriverError, FileOperations, OpenFlags, SessionToken, UserSlice,
};

use crate::executor::block_on;
use crate::usermem::SimUserMemory;

/// A request sent to a client thread.
pub enum Command {
    /// Open a device through its file operations.
    Open {
        /// The device's installed file operations.
        fops: Arc<dyn FileOperations>,
        /// Access mode and blocking behaviour.
        flags: OpenFlags,
    },
    /// Store `data` at `addr` in client memory, then write it to the device.
    Write {
        /// User address of the source buffer.
        addr: u64,
        /// Bytes to write.
        data: Vec<u8>,
    },
    /// Read `len` bytes from the device into client memory at `addr`.
    Read {
        /// User address of the destination buffer.
        addr: u64,
        /// Bytes requested.
        len: usize,
    },
    /// Close the open device.
    Close,
    /// Unmap the client's address space; later transfers through it fault.
    Unmap,
}

/// A client thread's answer to a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The open succeeded with this session id.
    Opened(u64),
    /// This many bytes were written.
    Wrote(usize),
    /// These bytes were read.
    Read(Vec<u8>),
    /// The device was closed.
    Closed,
    /// The client's memory is gone.
    Unmapped,
    /// The driver refused the operation.
    Failed(DriverError),
    /// The client has never opened a device.
    NotOpen,
}

/// Per-thread state of a client: its open file, if any.
struct Process {
    space: AddressSpaceId,
    memory: Arc<SimUserMemory>,
    signals: Arc<InterruptFlag>,
    file: Option<Arc<dyn FileOperations>>,
    session: Option<SessionToken>,
    /// Id of the last session, presented again after a close.
    last_id: Option<u64>,
}

impl Process {
    fn handle(&mut self, command: Command) -> Reply {
        match command {
            Command::Open { fops, flags } => self.open(fops, flags),
            Command::Write { addr, data } => self.write(addr, &data),
            Command::Read { addr, len } => self.read(addr, len),
            Command::Close => self.close(),
            Command::Unmap => {
                self.memory.unmap(self.space);
                Reply::Unmapped
            }
        }
    }

    fn open(&mut self, fops: Arc<dyn FileOperations>, flags: OpenFlags) -> Reply {
        let result = block_on(fops.open(flags, &self.signals));
        // A pending interrupt is consumed by the call it was delivered to.
        self.signals.clear();
        match result {
            Ok(token) => {
                let id = token.id();
                self.last_id = Some(id);
                self.session = Some(token);
                self.file = Some(fops);
                Reply::Opened(id)
            }
            Err(err) => Reply::Failed(err),
        }
    }

    /// The token to present: the live one, or a stale copy after close.
    fn token(&self) -> Option<SessionToken> {
        let id = self.session.as_ref().map(SessionToken::id).or(self.last_id)?;
        SessionToken::from_raw(id)
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> Reply {
        let (Some(file), Some(token)) = (self.file.clone(), self.token()) else {
            return Reply::NotOpen;
        };
        // An address outside client memory is passed through so the driver
        // sees the fault.
        let _ = self.memory.poke(self.space, addr, data);
        let Ok(src) = UserSlice::new(self.space, addr, data.len()) else {
            return Reply::Failed(DriverError::Transfer);
        };
        match file.write(&token, src) {
            Ok(n) => Reply::Wrote(n),
            Err(err) => Reply::Failed(err),
        }
    }

    fn read(&mut self, addr: u64, len: usize) -> Reply {
        let (Some(file), Some(token)) = (self.file.clone(), self.token()) else {
            return Reply::NotOpen;
        };
        let Ok(dst) = UserSlice::new(self.space, addr, len) else {
            return Reply::Failed(DriverError::Transfer);
        };
        match file.read(&token, dst) {
            Ok(n) => match self.memory.peek(self.space, addr, n) {
                Ok(bytes) => Reply::Read(bytes),
                Err(_) => Reply::Failed(DriverError::Transfer),
            },
            Err(err) => Reply::Failed(err),
        }
    }

    fn close(&mut self) -> Reply {
        let Some(file) = self.file.clone() else {
            return Reply::NotOpen;
        };
        let token = match self.session.take() {
            Some(token) => token,
            None => match self.token() {
                Some(stale) => stale,
                None => return Reply::NotOpen,
            },
        };
        match file.release(token) {
            Ok(()) => Reply::Closed,
            Err(err) => Reply::Failed(err),
        }
    }

    /// Closes a still-open session when the process exits.
    fn exit(&mut self) {
        if let (Some(file), Some(token)) = (self.file.take(), self.session.take()) {
            let _ = file.release(token);
        }
    }
}

/// Handle to a client thread.
pub struct Client {
    name: String,
    signals: Arc<InterruptFlag>,
    commands: Option<Sender<Command>>,
    replies: Receiver<Reply>,
    pending: bool,
    thread: Option<JoinHandle<()>>,
}

impl Client {
    /// Starts a client thread with a freshly mapped address space.
    pub fn spawn(name: &str, space: AddressSpaceId, memory: Arc<SimUserMemory>) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<Command>();
        let (reply_tx, reply_rx) = mpsc::channel();
        let signals = Arc::new(InterruptFlag::new());
        memory.map(space);

        let mut process = Process {
            space,
            memory,
            signals: Arc::clone(&signals),
            file: None,
            session: None,
            last_id: None,
        };
        let thread = thread::Builder::new()
            .name(format!("client-{name}"))
            .spawn(move || {
                for command in command_rx {
                    if reply_tx.send(process.handle(command)).is_err() {
                        break;
                    }
                }
                process.exit();
            })
            .with_context(|| format!("failed to spawn client '{name}'"))?;

        Ok(Self {
            name: name.to_owned(),
            signals,
            commands: Some(command_tx),
            replies: reply_rx,
            pending: false,
            thread: Some(thread),
        })
    }

    /// Client name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` while an earlier operation has not answered yet.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Sends `command` and waits up to `wait` for the answer.
    ///
    /// Returns `None` if the client is still busy after `wait`.
    pub fn submit(&mut self, command: Command, wait: Duration) -> Result<Option<Reply>> {
        if self.pending {
            bail!("client '{}' is still blocked in an earlier operation", self.name);
        }
        let Some(commands) = &self.commands else {
            bail!("client '{}' has exited", self.name);
        };
        commands
            .send(command)
            .map_err(|_| anyhow::anyhow!("client '{}' has exited", self.name))?;
        self.pending = true;
        self.wait(wait)
    }

    /// Waits up to `wait` for the answer to the outstanding operation.
    pub fn wait(&mut self, wait: Duration) -> Result<Option<Reply>> {
        if !self.pending {
            bail!("client '{}' has no outstanding operation", self.name);
        }
        match self.replies.recv_timeout(wait) {
            Ok(reply) => {
                self.pending = false;
                Ok(Some(reply))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                bail!("client '{}' died", self.name)
            }
        }
    }

    /// Raises the client's interrupt flag, cancelling a blocked open.
    pub fn interrupt(&self) {
        self.signals.raise();
    }

    /// Stops the thread, interrupting it first if it is blocked. Any open
    /// session is closed on the way out.
    pub fn shutdown(&mut self) {
        if self.pending {
            self.signals.raise();
        }
        self.commands = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
    }
}
