//! Progress reporting for setting applies

use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use regpilot_application::{ApplyProgressNotifier, GroupApplyReport, GroupOutcome, ItemApplyOutcome};
use regpilot_domain::ConfigurationItem;
use std::sync::{Mutex, PoisonError};

/// Reports apply progress with a progress bar on stderr
pub struct ProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
    target: fn() -> ProgressDrawTarget,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            target: ProgressDrawTarget::stderr,
        }
    }

    /// A reporter that tracks progress without drawing
    pub fn hidden() -> Self {
        Self {
            bar: Mutex::new(None),
            target: ProgressDrawTarget::hidden,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = self.bar.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            f(bar);
        }
    }

    /// Items completed so far in the running apply
    pub fn position(&self) -> Option<u64> {
        self.bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(ProgressBar::position)
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplyProgressNotifier for ProgressReporter {
    fn on_apply_start(&self, setting: &str, total_items: usize, enable: bool) {
        let bar = ProgressBar::with_draw_target(Some(total_items as u64), (self.target)());
        bar.set_style(Self::style());
        bar.set_prefix(format!("{} {}", if enable { "Enabling" } else { "Disabling" }, setting));
        bar.set_message("Starting...");
        *self.bar.lock().unwrap_or_else(PoisonError::into_inner) = Some(bar);
    }

    fn on_item_start(&self, item: &ConfigurationItem) {
        self.with_bar(|bar| bar.set_message(item.name.clone()));
    }

    fn on_item_complete(&self, item: &ConfigurationItem, outcome: &ItemApplyOutcome) {
        self.with_bar(|bar| {
            let mark = if outcome.is_failure() { "x".red() } else { "v".green() };
            bar.set_message(format!("{} {}", mark, item.name));
            bar.inc(1);
        });
    }

    fn on_apply_complete(&self, report: &GroupApplyReport) {
        if let Some(bar) = self.bar.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let message = match report.outcome {
                GroupOutcome::Succeeded => "done".green(),
                GroupOutcome::PartiallySucceeded => "partially applied".yellow(),
                GroupOutcome::Failed => "failed".red(),
                GroupOutcome::Cancelled => "cancelled".dimmed(),
            };
            bar.finish_with_message(message.to_string());
        }
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl ApplyProgressNotifier for SimpleProgress {
    fn on_apply_start(&self, setting: &str, total_items: usize, enable: bool) {
        eprintln!(
            "{} {} {} ({} items)",
            "->".cyan(),
            if enable { "Enabling" } else { "Disabling" },
            setting.bold(),
            total_items
        );
    }

    fn on_item_complete(&self, item: &ConfigurationItem, outcome: &ItemApplyOutcome) {
        if outcome.is_failure() {
            eprintln!("  {} {} (failed)", "x".red(), item.name);
        } else {
            eprintln!("  {} {}", "v".green(), item.name);
        }
    }
}
