//! Scenario files.
//!
//! A scenario is a TOML document describing the host, the device to load and
//! an ordered list of steps performed by named clients:
//!
//! ```toml
//! [device]
//! name = "testCharDevice"
//!
//! [host]
//! majors = [234, 254]
//!
//! [[step]]
//! op = "load"
//!
//! [[step]]
//! op = "open"
//! client = "a"
//! ```

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use vchar_core::log::LogLevel;
use vchar_fakedev::DeviceConfig;

/// A whole scenario file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Device configuration passed to the driver on `load`.
    #[serde(default)]
    pub device: DeviceSection,
    /// Simulated host behaviour.
    #[serde(default)]
    pub host: HostSection,
    /// Logging options.
    #[serde(default)]
    pub log: LogSection,
    /// Steps, run in order.
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// `[device]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSection {
    /// Registered device name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Minor number of the device.
    #[serde(default)]
    pub first_minor: u32,
}

fn default_name() -> String {
    DeviceConfig::default().name
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            first_minor: 0,
        }
    }
}

impl DeviceSection {
    /// Converts to the driver's configuration type.
    pub fn to_config(&self) -> DeviceConfig {
        DeviceConfig {
            name: self.name.clone(),
            first_minor: self.first_minor,
        }
    }
}

/// `[host]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostSection {
    /// Inclusive `[low, high]` range dynamic majors are drawn from, highest
    /// first.
    #[serde(default = "default_majors")]
    pub majors: [u32; 2],
    /// Make every region allocation fail.
    #[serde(default)]
    pub fail_alloc: bool,
    /// Make every dispatch installation fail.
    #[serde(default)]
    pub fail_install: bool,
    /// How long a client may take before an operation counts as blocked.
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
}

fn default_majors() -> [u32; 2] {
    [234, 254]
}

fn default_block_ms() -> u64 {
    200
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            majors: default_majors(),
            fail_alloc: false,
            fail_install: false,
            block_ms: default_block_ms(),
        }
    }
}

/// `[log]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    /// Most verbose level printed: `error`, `warn`, `info`, `debug` or `trace`.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl LogSection {
    /// Parses [`level`](Self::level).
    pub fn level(&self) -> Result<LogLevel> {
        LogLevel::parse(&self.level)
            .with_context(|| format!("unknown log level '{}'", self.level))
    }
}

/// What a step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Load the driver.
    Load,
    /// Unload the driver; refused while a client holds the device.
    Unload,
    /// Create a device node at `path` for the loaded device.
    Mknod,
    /// Open `path`, waiting if the device is held.
    Open,
    /// Open `path` without waiting.
    OpenNonblock,
    /// Write `data` through the client's session.
    Write,
    /// Read `len` bytes (or `data.len()`) through the client's session.
    Read,
    /// Close the client's session.
    Close,
    /// Raise the client's interrupt flag.
    Interrupt,
    /// Wait for the client's outstanding operation to finish.
    Await,
    /// Unmap the client's memory; its session stays open.
    Unmap,
}

impl Op {
    /// Returns `true` for operations performed by a client thread.
    pub fn needs_client(self) -> bool {
        !matches!(self, Self::Load | Self::Unload | Self::Mknod)
    }
}

/// One `[[step]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Operation to perform.
    pub op: Op,
    /// Client performing it.
    #[serde(default)]
    pub client: Option<String>,
    /// Device node path; defaults to `/dev/<device name>`.
    #[serde(default)]
    pub path: Option<String>,
    /// Bytes to write, or bytes a read must return.
    #[serde(default)]
    pub data: Option<String>,
    /// Number of bytes to read.
    #[serde(default)]
    pub len: Option<usize>,
    /// User address of the transfer buffer in the client's memory.
    #[serde(default)]
    pub addr: u64,
    /// Open for reading only or writing only instead of read-write.
    #[serde(default)]
    pub mode: Option<String>,
    /// Expected result: `ok`, `blocked`, or an error name.
    #[serde(default = "default_expect")]
    pub expect: String,
}

fn default_expect() -> String {
    "ok".into()
}

impl Scenario {
    /// Parses a scenario from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(text).context("failed to parse scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reads and parses a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        let [low, high] = self.host.majors;
        if low == 0 || low > high {
            bail!("[host] majors must be a non-empty range above 0, got [{low}, {high}]");
        }
        self.log.level()?;
        for (i, step) in self.steps.iter().enumerate() {
            if step.op.needs_client() && step.client.is_none() {
                bail!("step {}: '{:?}' needs a client", i + 1, step.op);
            }
            if step.op == Op::Write && step.data.is_none() {
                bail!("step {}: write needs data", i + 1);
            }
            if let Some(mode) = &step.mode {
                if !matches!(mode.as_str(), "r" | "w" | "rw") {
                    bail!("step {}: mode must be r, w or rw, got '{mode}'", i + 1);
                }
            }
        }
        Ok(())
    }

    /// The node path a step refers to.
    pub fn node_path(&self, step: &Step) -> String {
        step.path
            .clone()
            .unwrap_or_else(|| format!("/dev/{}", self.device.name))
    }
}
