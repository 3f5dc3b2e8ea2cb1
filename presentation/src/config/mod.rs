//! Presentation-level configuration
//!
//! Resolved output settings, after merging the config file with CLI flags.

use crate::cli::OutputFormat;

/// Output configuration for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Enable colored terminal output
    pub color: bool,
    /// Show progress bars while applying
    pub show_progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            color: true,
            show_progress: true,
        }
    }
}

impl OutputConfig {
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Progress bars only make sense next to human-readable output
    pub fn wants_progress(&self) -> bool {
        self.show_progress && self.format == OutputFormat::Table
    }
}
