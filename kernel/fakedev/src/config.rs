//! Load-time configuration.

use alloc::string::String;

use vchar_driver_api::DriverError;

/// Longest accepted device name, in bytes.
pub const MAX_NAME_LEN: usize = 64;

/// Parameters chosen when the module is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Name the device is registered under; also the suggested `/dev` node.
    pub name: String,
    /// Minor number of the single device.
    pub first_minor: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: String::from("testCharDevice"),
            first_minor: 0,
        }
    }
}

impl DeviceConfig {
    /// Config with the given name and minor 0.
    pub fn named(name: &str) -> Self {
        Self {
            name: String::from(name),
            ..Self::default()
        }
    }

    /// Checks that the name can be listed by the host and used as a node name.
    pub fn validate(&self) -> Result<(), DriverError> {
        let name_ok = !self.name.is_empty()
            && self.name.len() <= MAX_NAME_LEN
            && !self.name.contains('/')
            && !self.name.chars().any(char::is_whitespace);
        if name_ok {
            Ok(())
        } else {
            Err(DriverError::InvalidArgument)
        }
    }
}
