//! logward CLI library: argument parsing, command handlers, and output rendering.
//!
//! The `logward` binary is a thin wrapper around these modules; integration
//! tests drive the command handlers directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
