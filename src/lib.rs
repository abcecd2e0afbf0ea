//! Global mouse and keyboard hooks for an in-game overlay.
//!
//! [`input_hooks::HookManager`] owns the install/uninstall lifecycle of one
//! OS hook and fans decoded events out to registered handlers. The first
//! handler that returns `true` swallows the event; it is not passed to later
//! handlers or to the rest of the OS hook chain.

pub mod error;
pub mod input_hooks;
pub mod logging;
pub mod settings;

pub use error::{DecodeError, HookError};
