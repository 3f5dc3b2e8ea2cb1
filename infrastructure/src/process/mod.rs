//! Process-based command execution

mod executor;

pub use executor::{ELEVATION_CANCELLED, ProcessCommandExecutor};
