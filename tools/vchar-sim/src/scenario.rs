//! Scenario runner.
//!
//! Plays a [`Scenario`] against a fresh [`SimHost`]: loads the driver when
//! asked, creates device nodes, and drives client threads step by step,
//! checking each step's outcome against its expectation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use vchar_core::{kinfo, kwarn};
use vchar_driver_api::{AddressSpaceId, OpenFlags};
use vchar_fakedev::Registration;

use crate::client::{Client, Command, Reply};
use crate::config::{Op, Scenario, Step};
use crate::host::SimHost;
use crate::usermem::SimUserMemory;

/// How long an `await` step waits before declaring the client stuck.
const AWAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// What a step actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Completed successfully; carries any bytes read.
    Ok(Option<Vec<u8>>),
    /// Did not complete within the blocking window.
    Blocked,
    /// Failed with the named error.
    Error(String),
}

impl Outcome {
    fn from_reply(reply: Reply) -> Self {
        match reply {
            Reply::Read(bytes) => Self::Ok(Some(bytes)),
            Reply::Opened(_) | Reply::Wrote(_) | Reply::Closed | Reply::Unmapped => {
                Self::Ok(None)
            }
            Reply::Failed(err) => Self::Error(format!("{err:?}")),
            Reply::NotOpen => Self::Error("NotOpen".into()),
        }
    }

    fn matches(&self, expect: &str) -> bool {
        match self {
            Self::Ok(_) => expect == "ok",
            Self::Blocked => expect == "blocked",
            Self::Error(name) => expect == name,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(Some(bytes)) => write!(f, "ok ({:?})", String::from_utf8_lossy(bytes)),
            Self::Ok(None) => f.write_str("ok"),
            Self::Blocked => f.write_str("blocked"),
            Self::Error(name) => f.write_str(name),
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// 1-based step number.
    pub index: usize,
    /// Operation performed.
    pub op: Op,
    /// Client, for client operations.
    pub client: Option<String>,
    /// What happened.
    pub outcome: Outcome,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>3}. {:?}", self.index, self.op)?;
        if let Some(client) = &self.client {
            write!(f, " [{client}]")?;
        }
        write!(f, " -> {}", self.outcome)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct Report {
    /// Every step in order.
    pub steps: Vec<StepReport>,
    /// Range releases the host saw.
    pub releases: usize,
    /// Releases of ranges that were not allocated.
    pub bad_releases: usize,
    /// Ranges still allocated at the end.
    pub leaked_regions: usize,
}

/// Live state of a run.
pub struct Runner {
    scenario: Scenario,
    host: Arc<SimHost>,
    memory: Arc<SimUserMemory>,
    registration: Option<Registration>,
    clients: BTreeMap<String, Client>,
    block_wait: Duration,
}

impl Runner {
    /// Prepares a run of `scenario` on a fresh host.
    pub fn new(scenario: Scenario) -> Self {
        let [low, high] = scenario.host.majors;
        let host = Arc::new(SimHost::new(low, high));
        host.set_fail_alloc(scenario.host.fail_alloc);
        host.set_fail_install(scenario.host.fail_install);
        let block_wait = Duration::from_millis(scenario.host.block_ms);
        Self {
            scenario,
            host,
            memory: Arc::new(SimUserMemory::new()),
            registration: None,
            clients: BTreeMap::new(),
            block_wait,
        }
    }

    /// The simulated host.
    pub fn host(&self) -> &Arc<SimHost> {
        &self.host
    }

    /// Runs every step, stopping at the first unmet expectation.
    ///
    /// At the end all clients exit (closing their sessions) and a driver
    /// still loaded is unloaded.
    pub fn run(mut self) -> Result<Report> {
        let steps = self.scenario.steps.clone();
        let mut reports = Vec::with_capacity(steps.len());
        let mut result = Ok(());

        for (i, step) in steps.iter().enumerate() {
            let index = i + 1;
            let outcome = match self.step(step) {
                Ok(outcome) => outcome,
                Err(err) => {
                    result = Err(err.context(format!("step {index} ({:?})", step.op)));
                    break;
                }
            };
            let report = StepReport {
                index,
                op: step.op,
                client: step.client.clone(),
                outcome,
            };
            kinfo!("sim: {}", report);
            let checked = check(step, &report.outcome)
                .with_context(|| format!("step {index} ({:?})", step.op));
            reports.push(report);
            if let Err(err) = checked {
                result = Err(err);
                break;
            }
        }

        self.finish();
        result?;
        Ok(Report {
            steps: reports,
            releases: self.host.release_count(),
            bad_releases: self.host.bad_release_count(),
            leaked_regions: self.host.allocated_regions(),
        })
    }

    fn finish(&mut self) {
        for client in self.clients.values_mut() {
            client.shutdown();
        }
        if let Some(registration) = self.registration.take() {
            registration.stop();
        }
    }

    fn step(&mut self, step: &Step) -> Result<Outcome> {
        match step.op {
            Op::Load => self.load(),
            Op::Unload => Ok(self.unload()),
            Op::Mknod => self.mknod(step),
            Op::Open => self.open(step, OpenFlags::empty()),
            Op::OpenNonblock => self.open(step, OpenFlags::NONBLOCK),
            Op::Write => {
                let data = step.data.clone().unwrap_or_default().into_bytes();
                self.submit(step, Command::Write {
                    addr: step.addr,
                    data,
                })
            }
            Op::Read => {
                let len = step
                    .len
                    .or_else(|| step.data.as_ref().map(String::len))
                    .unwrap_or(vchar_fakedev::BUFFER_CAPACITY);
                self.submit(step, Command::Read {
                    addr: step.addr,
                    len,
                })
            }
            Op::Close => self.submit(step, Command::Close),
            Op::Unmap => self.submit(step, Command::Unmap),
            Op::Interrupt => {
                self.client(step)?.interrupt();
                Ok(Outcome::Ok(None))
            }
            Op::Await => {
                let client = self.client(step)?;
                if !client.is_pending() {
                    bail!("client '{}' is not blocked", client.name());
                }
                Ok(client
                    .wait(AWAIT_TIMEOUT)?
                    .map_or(Outcome::Blocked, Outcome::from_reply))
            }
        }
    }

    fn load(&mut self) -> Result<Outcome> {
        if self.registration.is_some() {
            bail!("driver is already loaded");
        }
        let config = self.scenario.device.to_config();
        match Registration::start(self.host.clone(), self.memory.clone(), &config) {
            Ok(registration) => {
                self.registration = Some(registration);
                Ok(Outcome::Ok(None))
            }
            Err(err) => Ok(Outcome::Error(format!("{err:?}"))),
        }
    }

    fn unload(&mut self) -> Outcome {
        match self.registration.take() {
            None => Outcome::Error("NotLoaded".into()),
            Some(registration) if registration.is_in_use() => {
                kwarn!("sim: refusing to unload {}: device in use", registration.info().name);
                self.registration = Some(registration);
                Outcome::Error("InUse".into())
            }
            Some(registration) => {
                registration.stop();
                Outcome::Ok(None)
            }
        }
    }

    fn mknod(&mut self, step: &Step) -> Result<Outcome> {
        let Some(registration) = &self.registration else {
            return Ok(Outcome::Error("NotLoaded".into()));
        };
        let path = self.scenario.node_path(step);
        self.host.mknod(&path, registration.region().first())?;
        Ok(Outcome::Ok(None))
    }

    fn open(&mut self, step: &Step, extra: OpenFlags) -> Result<Outcome> {
        let path = self.scenario.node_path(step);
        let fops = match self.host.lookup(&path) {
            Ok(fops) => fops,
            Err(_) => return Ok(Outcome::Error("NoDevice".into())),
        };
        let mode = match step.mode.as_deref() {
            Some("r") => OpenFlags::READ,
            Some("w") => OpenFlags::WRITE,
            _ => OpenFlags::RDWR,
        };
        self.submit(step, Command::Open {
            fops,
            flags: mode | extra,
        })
    }

    fn submit(&mut self, step: &Step, command: Command) -> Result<Outcome> {
        let wait = self.block_wait;
        let reply = self.client(step)?.submit(command, wait)?;
        Ok(reply.map_or(Outcome::Blocked, Outcome::from_reply))
    }

    /// The step's client, started on first use.
    fn client(&mut self, step: &Step) -> Result<&mut Client> {
        let Some(name) = step.client.as_deref() else {
            bail!("'{:?}' needs a client", step.op);
        };
        if !self.clients.contains_key(name) {
            let id = u32::try_from(self.clients.len() + 1).context("too many clients")?;
            let client = Client::spawn(name, AddressSpaceId(id), self.memory.clone())?;
            self.clients.insert(name.to_owned(), client);
        }
        self.clients
            .get_mut(name)
            .with_context(|| format!("client '{name}' missing"))
    }
}

/// Compares an outcome with the step's expectation.
fn check(step: &Step, outcome: &Outcome) -> Result<()> {
    if !outcome.matches(&step.expect) {
        bail!("expected {}, got {}", step.expect, outcome);
    }
    if let (Op::Read | Op::Await, Outcome::Ok(Some(bytes)), Some(want)) =
        (step.op, outcome, &step.data)
    {
        if bytes != want.as_bytes() {
            bail!(
                "read {:?}, expected {:?}",
                String::from_utf8_lossy(bytes),
                want
            );
        }
    }
    Ok(())
}

/// Parses and runs a scenario.
pub fn run(scenario: Scenario) -> Result<Report> {
    Runner::new(scenario).run()
}

/// The built-in demonstration: two clients contend for the device.
pub const DEMO: &str = r#"
[device]
name = "testCharDevice"

[[step]]
op = "load"

[[step]]
op = "mknod"

[[step]]
op = "open"
client = "client1"

[[step]]
op = "open"
client = "client2"
expect = "blocked"

[[step]]
op = "close"
client = "client1"

[[step]]
op = "await"
client = "client2"

[[step]]
op = "write"
client = "client2"
data = "hi"

[[step]]
op = "read"
client = "client2"
data = "hi"

[[step]]
op = "close"
client = "client2"

[[step]]
op = "unload"
"#;
