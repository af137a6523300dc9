//! Input module for synthetic pointer and keyboard events
//!
//! `ActionCommand` is the only thing that crosses from the pipeline to the
//! operating system. Backends:
//! - CoreGraphics (macOS): posts CGEvents at the HID level
//! - DryRun: logs commands without touching the OS

mod backend;
mod command;
#[cfg(target_os = "macos")]
mod macos;

pub use backend::{DryRunBackend, InputBackend, InputError};
pub use command::{ActionCommand, Key};
#[cfg(target_os = "macos")]
pub use macos::CoreGraphicsBackend;

#[cfg(test)]
pub use backend::testing;
