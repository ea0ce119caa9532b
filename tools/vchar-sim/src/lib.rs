//! In-process host for the fake character device.
//!
//! Provides a simulated kernel ([`host::SimHost`]), per-client address
//! spaces ([`usermem::SimUserMemory`]) and client threads
//! ([`client::Client`]), and plays TOML scenarios ([`config::Scenario`])
//! against a loaded driver.

pub mod client;
pub mod config;
pub mod executor;
pub mod host;
pub mod logging;
pub mod scenario;
pub mod usermem;
