//! Configuration file loading for regpilot
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `REGPILOT_*` environment variables (`__` separates sections)
//! 2. `--config <path>` specified file
//! 3. Project root: `./regpilot.toml` or `./.regpilot.toml`
//! 4. Global: `<config dir>/regpilot/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileAuditConfig, FileCatalogConfig, FileConfig, FileElevationConfig,
    FileEngineConfig, FileLoggingConfig, FileOutputConfig,
};
pub use loader::ConfigLoader;
