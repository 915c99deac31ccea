//! Binary-local application orchestration.
//!
//! `entry` dispatches subcommands; `context` turns a loaded config into the
//! library services the handlers in `commands` drive.

pub(crate) mod commands;
pub(crate) mod context;
pub(crate) mod entry;
