//! JSON output

use super::formatter::{CatalogEntry, OutputFormatter, PowerPlanStatus};
use regpilot_application::{CacheStats, GroupApplyReport, StatusReport};
use serde::Serialize;

/// Pretty-printed JSON for scripting
pub struct JsonFormatter;

impl JsonFormatter {
    fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }
}

impl OutputFormatter for JsonFormatter {
    fn catalog(&self, entries: &[CatalogEntry]) -> String {
        Self::to_json(entries)
    }

    fn status(&self, reports: &[StatusReport]) -> String {
        Self::to_json(reports)
    }

    fn apply(&self, report: &GroupApplyReport) -> String {
        Self::to_json(report)
    }

    fn power(&self, plans: &[PowerPlanStatus]) -> String {
        Self::to_json(plans)
    }

    fn cache_stats(&self, stats: &CacheStats) -> String {
        Self::to_json(stats)
    }
}
