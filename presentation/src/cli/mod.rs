//! Command-line interface definitions

pub mod commands;

pub use commands::{Cli, Command, OutputFormat, PowerCommand, TargetState};
