//! Infrastructure layer for regpilot
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: registry backends, process execution, change
//! notifiers, plus catalog and configuration file loading.

pub mod catalog;
pub mod config;
pub mod notify;
pub mod process;
pub mod registry;

// Re-export commonly used types
pub use catalog::{CatalogError, TomlCatalog};
pub use config::{
    ConfigLoader, ConfigValidationError, FileAuditConfig, FileCatalogConfig, FileConfig,
    FileElevationConfig, FileEngineConfig, FileLoggingConfig, FileOutputConfig,
};
pub use notify::{BroadcastChangeNotifier, FanoutChangeNotifier, JsonlChangeLog};
pub use process::ProcessCommandExecutor;
pub use registry::{MemoryRegistry, RegistrySnapshot, SnapshotError};
#[cfg(windows)]
pub use registry::WindowsRegistry;
