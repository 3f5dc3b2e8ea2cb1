//! Composite notifier

use regpilot_application::ports::change_notifier::{ChangeNotifier, NotifyError};
use regpilot_domain::ValueChange;
use std::sync::Arc;
use tracing::warn;

/// Publishes to every inner notifier, even after one fails.
/// The first error is returned.
#[derive(Default)]
pub struct FanoutChangeNotifier {
    notifiers: Vec<Arc<dyn ChangeNotifier>>,
}

impl FanoutChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl ChangeNotifier for FanoutChangeNotifier {
    fn publish(&self, change: &ValueChange) -> Result<(), NotifyError> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.publish(change) {
                warn!("Change notifier failed for {}: {}", change.path, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
