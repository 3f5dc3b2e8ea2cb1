//! Output formatter trait

use super::{ConsoleFormatter, JsonFormatter};
use crate::cli::OutputFormat;
use regpilot_application::{CacheStats, GroupApplyReport, StatusReport};
use regpilot_domain::{CombinationPolicy, Setting, Status};
use serde::Serialize;

/// One line of `regpilot list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    /// `None` for single-item settings
    pub policy: Option<CombinationPolicy>,
    pub items: usize,
}

impl From<&Setting> for CatalogEntry {
    fn from(setting: &Setting) -> Self {
        Self {
            id: setting.id().to_string(),
            name: setting.name().to_string(),
            policy: match setting {
                Setting::Single(_) => None,
                Setting::Linked(group) => Some(group.policy),
            },
            items: setting.items().len(),
        }
    }
}

/// Status of one known power plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PowerPlanStatus {
    pub name: String,
    pub guid: String,
    pub status: Status,
}

/// Trait for formatting command results
pub trait OutputFormatter {
    fn catalog(&self, entries: &[CatalogEntry]) -> String;

    fn status(&self, reports: &[StatusReport]) -> String;

    fn apply(&self, report: &GroupApplyReport) -> String;

    fn power(&self, plans: &[PowerPlanStatus]) -> String;

    fn cache_stats(&self, stats: &CacheStats) -> String;
}

pub fn formatter_for(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Table => Box::new(ConsoleFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}
