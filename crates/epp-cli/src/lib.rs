//! EPP toolkit CLI library
//!
//! Shared code behind the `epp` binary: command implementations, flag
//! resolution and terminal output.

pub mod commands;
pub mod output;
pub mod settings;
