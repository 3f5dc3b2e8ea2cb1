//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const PROJECT_FILES: [&str; 2] = ["regpilot.toml", ".regpilot.toml"];
const ENV_PREFIX: &str = "REGPILOT_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `REGPILOT_` environment variables, e.g. `REGPILOT_ENGINE__CACHE_READS=false`
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./regpilot.toml` or `./.regpilot.toml`
    /// 4. Global: `<config dir>/regpilot/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(&path));
        }

        Self::extract(figment, config_path.map(PathBuf::as_path))
    }

    /// Defaults, an optional file and the environment; no discovery
    pub fn load_file(config_path: &Path) -> Result<FileConfig, Box<figment::Error>> {
        let figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));
        Self::extract(figment, Some(config_path))
    }

    fn extract(mut figment: Figment, explicit: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("regpilot").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Describe the config file locations being used (for --show-config)
    pub fn describe_sources() -> Vec<String> {
        let mut lines = vec!["Configuration sources (in priority order):".to_string()];

        lines.push(format!("  [ENV  ] {}*", ENV_PREFIX));

        match Self::project_config_path() {
            Some(path) => lines.push(format!("  [FOUND] Project: {}", path.display())),
            None => lines.push("  [     ] Project: ./regpilot.toml or ./.regpilot.toml".to_string()),
        }

        if let Some(path) = Self::global_config_path() {
            let marker = if path.exists() { "FOUND" } else { "     " };
            lines.push(format!("  [{}] Global:  {}", marker, path.display()));
        }

        lines.push("  [     ] Default: built-in defaults".to_string());
        lines
    }
}
