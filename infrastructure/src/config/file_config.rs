//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application parameters
//! after validation.

use regpilot_application::{ElevationParams, EngineParams};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("elevation.shell cannot be empty")]
    EmptyShell,

    #[error("audit.path cannot be empty")]
    EmptyAuditPath,

    #[error("catalog.path cannot be empty")]
    EmptyCatalogPath,

    #[error("output.format must be \"table\" or \"json\", got \"{0}\"")]
    InvalidOutputFormat(String),
}

/// Raw engine configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEngineConfig {
    /// Memoize registry lookups between writes
    pub cache_reads: bool,
    /// Read values back after direct writes
    pub verify_writes: bool,
}

impl Default for FileEngineConfig {
    fn default() -> Self {
        let params = EngineParams::default();
        Self {
            cache_reads: params.cache_reads,
            verify_writes: params.verify_writes,
        }
    }
}

/// Raw elevation configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileElevationConfig {
    /// Allow the elevated-script fallback
    pub enabled: bool,
    /// Run the script unelevated once when elevation is unavailable
    pub retry_unelevated: bool,
    /// Shell that runs generated scripts
    pub shell: String,
}

impl Default for FileElevationConfig {
    fn default() -> Self {
        let params = ElevationParams::default();
        Self {
            enabled: params.enabled,
            retry_unelevated: params.retry_unelevated,
            shell: params.shell,
        }
    }
}

/// Raw audit log configuration from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAuditConfig {
    /// Append every value change to a JSONL file
    pub enabled: bool,
    /// Log file; defaults to `<data dir>/regpilot/changes.jsonl`
    pub path: Option<String>,
}

/// Raw catalog configuration from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCatalogConfig {
    /// Catalog file; the built-in catalog is used when unset
    pub path: Option<String>,
}

/// Raw output configuration from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    /// "table" or "json"
    pub format: Option<String>,
    /// Enable colored terminal output
    pub color: bool,
    /// Show progress bars while applying
    pub show_progress: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            format: None,
            color: true,
            show_progress: true,
        }
    }
}

/// Raw logging configuration from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Directory for a daily-rotated log file, in addition to stderr
    pub directory: Option<String>,
}

/// Complete configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub engine: FileEngineConfig,
    pub elevation: FileElevationConfig,
    pub audit: FileAuditConfig,
    pub catalog: FileCatalogConfig,
    pub output: FileOutputConfig,
    pub logging: FileLoggingConfig,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| v.trim().is_empty())
}

impl FileConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.elevation.shell.trim().is_empty() {
            return Err(ConfigValidationError::EmptyShell);
        }
        if is_blank(&self.audit.path) {
            return Err(ConfigValidationError::EmptyAuditPath);
        }
        if is_blank(&self.catalog.path) {
            return Err(ConfigValidationError::EmptyCatalogPath);
        }
        if let Some(format) = &self.output.format
            && !matches!(format.as_str(), "table" | "json")
        {
            return Err(ConfigValidationError::InvalidOutputFormat(format.clone()));
        }
        Ok(())
    }

    pub fn to_engine_params(&self) -> EngineParams {
        EngineParams::default()
            .with_cache_reads(self.engine.cache_reads)
            .with_verify_writes(self.engine.verify_writes)
            .with_elevation(self.elevation.enabled)
            .with_unelevated_retry(self.elevation.retry_unelevated)
            .with_shell(self.elevation.shell.clone())
    }

    /// Audit log file when auditing is enabled
    pub fn audit_path(&self) -> Option<PathBuf> {
        if !self.audit.enabled {
            return None;
        }
        match &self.audit.path {
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::data_dir().map(|d| d.join("regpilot").join("changes.jsonl")),
        }
    }

    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.catalog.path.as_ref().map(PathBuf::from)
    }
}
