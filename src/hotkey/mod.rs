//! Hotkey module for the global kill switch
//!
//! Uses macOS CGEventTap to watch modifier keys; Control+Option+Command
//! toggles gesture control and forces held input to be released.

mod keys;
mod listener;

pub use listener::{HotkeyEvent, HotkeyListener};
