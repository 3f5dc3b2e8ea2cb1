//! Engine parameters: write and fallback control.
//!
//! [`EngineParams`] groups the static parameters that control how the
//! engine writes: whether reads are cached, whether writes are re-read, and
//! how the privileged fallback may run. These are application-layer
//! concerns, not domain policy.

use serde::{Deserialize, Serialize};

/// Controls the out-of-process elevated fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevationParams {
    /// Allow the privileged fallback at all.
    pub enabled: bool,
    /// Retry once without elevation when elevation cannot be obtained.
    pub retry_unelevated: bool,
    /// Shell used to run fallback scripts.
    pub shell: String,
}

impl Default for ElevationParams {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_unelevated: true,
            shell: "powershell.exe".to_string(),
        }
    }
}

/// Engine control parameters.
///
/// Used by the value store, the privileged fallback and the apply use case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineParams {
    /// Memoize key/value lookups between applies.
    pub cache_reads: bool,
    /// Re-read every direct write and fall back when it did not stick.
    pub verify_writes: bool,
    /// Privileged fallback control.
    pub elevation: ElevationParams,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            cache_reads: true,
            verify_writes: true,
            elevation: ElevationParams::default(),
        }
    }
}

impl EngineParams {
    // ==================== Builder Methods ====================

    pub fn with_cache_reads(mut self, enabled: bool) -> Self {
        self.cache_reads = enabled;
        self
    }

    pub fn with_verify_writes(mut self, enabled: bool) -> Self {
        self.verify_writes = enabled;
        self
    }

    pub fn with_elevation(mut self, enabled: bool) -> Self {
        self.elevation.enabled = enabled;
        self
    }

    pub fn with_unelevated_retry(mut self, enabled: bool) -> Self {
        self.elevation.retry_unelevated = enabled;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.elevation.shell = shell.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = EngineParams::default();
        assert!(params.cache_reads);
        assert!(params.verify_writes);
        assert!(params.elevation.enabled);
        assert!(params.elevation.retry_unelevated);
        assert_eq!(params.elevation.shell, "powershell.exe");
    }

    #[test]
    fn test_builder() {
        let params = EngineParams::default()
            .with_cache_reads(false)
            .with_elevation(false)
            .with_shell("pwsh");

        assert!(!params.cache_reads);
        assert!(!params.elevation.enabled);
        assert_eq!(params.elevation.shell, "pwsh");
    }
}
