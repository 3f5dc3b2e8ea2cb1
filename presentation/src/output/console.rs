//! Console output formatter

use super::formatter::{CatalogEntry, OutputFormatter, PowerPlanStatus};
use colored::{ColoredString, Colorize};
use regpilot_application::{
    CacheStats, GroupApplyReport, GroupOutcome, ItemApplyOutcome, ItemApplyResult, StatusReport,
    WriteMethod,
};
use regpilot_domain::Status;

const ID_WIDTH: usize = 28;
const STATUS_WIDTH: usize = 12;

/// Formats reports as colored tables
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Pad first, then color, so ANSI codes do not skew the columns
    fn status_cell(status: Status) -> ColoredString {
        let cell = format!("{:<width$}", status.as_str(), width = STATUS_WIDTH);
        match status {
            Status::Applied => cell.green(),
            Status::NotApplied => cell.normal(),
            Status::Modified => cell.yellow(),
            Status::Unknown => cell.dimmed(),
            Status::Error => cell.red().bold(),
        }
    }

    fn outcome_label(outcome: GroupOutcome) -> ColoredString {
        let label = outcome.to_string();
        match outcome {
            GroupOutcome::Succeeded => label.green().bold(),
            GroupOutcome::PartiallySucceeded => label.yellow().bold(),
            GroupOutcome::Failed => label.red().bold(),
            GroupOutcome::Cancelled => label.dimmed(),
        }
    }

    fn item_line(outcome: &ItemApplyOutcome) -> String {
        match &outcome.result {
            ItemApplyResult::Succeeded => {
                let method = match outcome.method {
                    WriteMethod::Elevated => " (elevated)",
                    WriteMethod::Direct | WriteMethod::None => "",
                };
                format!("  {} {}{}", "v".green(), outcome.item_id, method.dimmed())
            }
            ItemApplyResult::Skipped(reason) => {
                format!("  {} {} {}", "-".dimmed(), outcome.item_id, format!("(skipped: {})", reason).dimmed())
            }
            ItemApplyResult::Failed(reason) => {
                format!("  {} {} {}", "x".red(), outcome.item_id, reason.red())
            }
            ItemApplyResult::Cancelled => {
                format!("  {} {} {}", "-".dimmed(), outcome.item_id, "(cancelled)".dimmed())
            }
        }
    }

    fn header(columns: &[(&str, usize)]) -> String {
        let line: String = columns
            .iter()
            .map(|(title, width)| format!("{:<width$}", title, width = *width))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}\n", line.trim_end().cyan().bold())
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn catalog(&self, entries: &[CatalogEntry]) -> String {
        let mut output = Self::header(&[("ID", ID_WIDTH), ("ITEMS", 8), ("NAME", 0)]);
        for entry in entries {
            let items = match entry.policy {
                Some(policy) => format!("{} ({})", entry.items, policy),
                None => entry.items.to_string(),
            };
            output.push_str(&format!(
                "{:<id$} {:<8} {}\n",
                entry.id,
                items,
                entry.name,
                id = ID_WIDTH
            ));
        }
        output
    }

    fn status(&self, reports: &[StatusReport]) -> String {
        let mut output = Self::header(&[("ID", ID_WIDTH), ("STATUS", STATUS_WIDTH), ("NAME", 0)]);
        for report in reports {
            output.push_str(&format!(
                "{:<id$} {} {}\n",
                report.setting_id.bold(),
                Self::status_cell(report.status),
                report.name,
                id = ID_WIDTH
            ));

            // Linked groups show their items below the combined row
            if report.policy.is_none() {
                continue;
            }
            for item in &report.items {
                let current = item
                    .current_value
                    .as_ref()
                    .map(|v| format!(" = {}", v))
                    .unwrap_or_default();
                output.push_str(&format!(
                    "  {:<id$} {} {}{}\n",
                    item.item_id,
                    Self::status_cell(item.status),
                    item.path.dimmed(),
                    current.dimmed(),
                    id = ID_WIDTH - 2
                ));
            }
        }
        output
    }

    fn apply(&self, report: &GroupApplyReport) -> String {
        let mut output = format!(
            "{} -> {}: {}\n",
            report.setting_id.bold(),
            if report.enable { "enabled" } else { "disabled" },
            Self::outcome_label(report.outcome)
        );
        for item in &report.items {
            output.push_str(&Self::item_line(item));
            output.push('\n');
        }
        output
    }

    fn power(&self, plans: &[PowerPlanStatus]) -> String {
        let mut output = Self::header(&[("PLAN", ID_WIDTH), ("STATUS", STATUS_WIDTH), ("GUID", 0)]);
        for plan in plans {
            output.push_str(&format!(
                "{:<id$} {} {}\n",
                plan.name,
                Self::status_cell(plan.status),
                plan.guid.dimmed(),
                id = ID_WIDTH
            ));
        }
        output
    }

    fn cache_stats(&self, stats: &CacheStats) -> String {
        format!(
            "{} {} hits, {} misses, {} entries\n",
            "Read cache:".cyan().bold(),
            stats.hits,
            stats.misses,
            stats.entries
        )
    }
}
