//! Apply progress port
//!
//! Defines the interface for reporting progress while a setting's items are
//! applied.

use crate::use_cases::apply_setting::{GroupApplyReport, ItemApplyOutcome};
use regpilot_domain::ConfigurationItem;

/// Callback for progress updates during an apply
///
/// Implementations live in the presentation layer.
pub trait ApplyProgressNotifier: Send + Sync {
    /// Called once before the first item
    fn on_apply_start(&self, _setting: &str, _total_items: usize, _enable: bool) {}

    /// Called before each item
    fn on_item_start(&self, _item: &ConfigurationItem) {}

    /// Called after each item
    fn on_item_complete(&self, _item: &ConfigurationItem, _outcome: &ItemApplyOutcome) {}

    /// Called once after the last item
    fn on_apply_complete(&self, _report: &GroupApplyReport) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoApplyProgress;

impl ApplyProgressNotifier for NoApplyProgress {}
