//! Log sink for driver output.
//!
//! The driver logs through `vchar_core`'s function-pointer hook; the
//! simulator installs [`stderr_sink`] there and filters by a global maximum
//! level.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use vchar_core::log::{self, LogLevel};

static MAX_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Installs the stderr sink with `level` as the most verbose level shown.
pub fn init(level: LogLevel) {
    set_max_level(level);
    // SAFETY: `stderr_sink` takes no locks of its own beyond stderr's and
    // never calls back into driver code.
    unsafe { log::set_log_fn(stderr_sink) };
}

/// Changes the most verbose level shown.
pub fn set_max_level(level: LogLevel) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns `true` if messages at `level` are currently printed.
pub fn enabled(level: LogLevel) -> bool {
    level as u8 <= MAX_LEVEL.load(Ordering::Relaxed)
}

fn stderr_sink(level: LogLevel, args: fmt::Arguments<'_>) {
    if enabled(level) {
        eprintln!("[{}] {}", level.name(), args);
    }
}
