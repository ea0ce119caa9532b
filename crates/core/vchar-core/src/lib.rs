//! Core logging and synchronization primitives for the vchar driver stack.
//!
//! Everything here is `no_std` + `alloc` so the driver crates can use it in
//! kernel context, while `cargo test` still runs the unit tests on the host.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod log;
pub mod sync;
