//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod apply_progress;
pub mod change_notifier;
pub mod command_executor;
pub mod read_cache;
pub mod registry_backend;
