//! CLI Adapter
//!
//! Command-line interface for the watcher.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CliApp, Command, ResetCmd, RunCmd, TradesCmd};
