//! Command line interface for the `remove-bg` binary
//!
//! This module is only available when the "cli" feature is enabled.

#[path = "main.rs"]
mod main_impl;

pub use main_impl::{main, parse_args, run, run_with, success_line, usage, Cli};
