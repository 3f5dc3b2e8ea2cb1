//! Privileged write fallback
//!
//! Last resort when a direct write fails even after ownership takeover.
//! The change is rendered as a self-verifying PowerShell script and run
//! out of process with elevated rights through the [`CommandExecutor`] port.

use crate::config::ElevationParams;
use crate::ports::command_executor::{CommandExecutor, CommandLine};
use crate::ports::read_cache::ReadCache;
use regpilot_domain::util::summarize_output;
use regpilot_domain::{ConfigValue, ElevatedScript, KeyPath};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Bytes of script output kept in log lines
const OUTPUT_SUMMARY_BYTES: usize = 200;

pub struct PrivilegedWriteFallback {
    executor: Arc<dyn CommandExecutor>,
    cache: Arc<dyn ReadCache>,
    params: ElevationParams,
    invocations: AtomicUsize,
}

impl PrivilegedWriteFallback {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        cache: Arc<dyn ReadCache>,
        params: ElevationParams,
    ) -> Self {
        Self {
            executor,
            cache,
            params,
            invocations: AtomicUsize::new(0),
        }
    }

    /// Create `key` if needed and set `name` to `value`
    pub async fn set_value_elevated(&self, key: &KeyPath, name: &str, value: &ConfigValue) -> bool {
        self.run(ElevatedScript::set_value(key, name, value)).await
    }

    pub async fn delete_value_elevated(&self, key: &KeyPath, name: &str) -> bool {
        self.run(ElevatedScript::delete_value(key, name)).await
    }

    /// Remove `key` with its subtree
    pub async fn delete_key_elevated(&self, key: &KeyPath) -> bool {
        self.run(ElevatedScript::delete_key(key)).await
    }

    /// Number of scripts actually started
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::Relaxed)
    }

    fn command_for(&self, script: &ElevatedScript) -> CommandLine {
        CommandLine::new(&self.params.shell)
            .args([
                "-NoProfile",
                "-NonInteractive",
                "-ExecutionPolicy",
                "Bypass",
                "-EncodedCommand",
            ])
            .arg(script.encoded())
    }

    async fn run(&self, script: ElevatedScript) -> bool {
        let key = script.key();
        if !self.params.enabled {
            debug!("Privileged fallback disabled, not touching {}", key);
            return false;
        }

        self.invocations.fetch_add(1, Ordering::Relaxed);
        let command = self.command_for(&script);
        info!("Running elevated fallback for {}", key);

        let result = match self.executor.execute_elevated(&command).await {
            Err(e) if e.is_elevation_unavailable() && self.params.retry_unelevated => {
                warn!("{}; retrying {} without elevation", e, key);
                self.executor.execute(&command).await
            }
            other => other,
        };

        match result {
            Ok(output) if output.is_success() => {
                self.cache.invalidate_key(key);
                debug!("Elevated fallback for {} succeeded", key);
                true
            }
            Ok(output) => {
                let detail = if output.stderr.trim().is_empty() {
                    &output.stdout
                } else {
                    &output.stderr
                };
                warn!(
                    "Elevated fallback for {} exited with {}: {}",
                    key,
                    output.exit_code,
                    summarize_output(detail, OUTPUT_SUMMARY_BYTES)
                );
                false
            }
            Err(e) => {
                warn!("Elevated fallback for {} failed: {}", key, e);
                false
            }
        }
    }
}
