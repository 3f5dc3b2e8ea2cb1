//! Presentation layer for regpilot
//!
//! This crate contains CLI definitions, output formatters and progress
//! reporters.

pub mod cli;
pub mod config;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{Cli, Command, OutputFormat, PowerCommand, TargetState};
pub use config::OutputConfig;
pub use output::{
    CatalogEntry, ConsoleFormatter, JsonFormatter, OutputFormatter, PowerPlanStatus, formatter_for,
};
pub use progress::reporter::{ProgressReporter, SimpleProgress};
