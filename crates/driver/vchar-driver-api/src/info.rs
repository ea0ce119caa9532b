//! Static module metadata.

use core::fmt;

/// Static metadata describing a loadable driver module.
///
/// This is what `modinfo` would print for the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Short module name.
    pub name: &'static str,
    /// License identifier.
    pub license: &'static str,
    /// Module author.
    pub author: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

impl fmt::Display for ModuleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, license {}, by {})",
            self.name, self.description, self.license, self.author
        )
    }
}
