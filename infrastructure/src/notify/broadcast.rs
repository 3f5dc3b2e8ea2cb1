//! Broadcast channel notifier

use regpilot_application::ports::change_notifier::{ChangeNotifier, NotifyError};
use regpilot_domain::ValueChange;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

/// Publishes every change to all current subscribers.
///
/// Publishing with no subscribers succeeds. Slow subscribers that fall more
/// than the channel capacity behind observe `Lagged` on receive.
pub struct BroadcastChangeNotifier {
    sender: broadcast::Sender<ValueChange>,
}

impl Default for BroadcastChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastChangeNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ValueChange> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ChangeNotifier for BroadcastChangeNotifier {
    fn publish(&self, change: &ValueChange) -> Result<(), NotifyError> {
        match self.sender.send(change.clone()) {
            Ok(receivers) => trace!("Change to {} sent to {} subscribers", change.path, receivers),
            Err(_) => trace!("Change to {} had no subscribers", change.path),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regpilot_domain::{ConfigPath, ConfigValue, Hive, KeyPath};

    fn change() -> ValueChange {
        ValueChange::new(
            "telemetry",
            ConfigPath::new(KeyPath::new(Hive::LocalMachine, "SOFTWARE\\X"), "Y"),
            Some(ConfigValue::Dword(1)),
            Some(ConfigValue::Dword(0)),
        )
    }

    #[test]
    fn test_publish_without_subscribers() {
        let notifier = BroadcastChangeNotifier::new();
        assert_eq!(notifier.subscriber_count(), 0);
        assert!(notifier.publish(&change()).is_ok());
    }

    #[tokio::test]
    async fn test_subscribers_receive_changes() {
        let notifier = BroadcastChangeNotifier::with_capacity(4);
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        notifier.publish(&change()).unwrap();
        assert_eq!(first.recv().await.unwrap().item_id, "telemetry");
        assert_eq!(second.recv().await.unwrap().new_value, Some(ConfigValue::Dword(0)));
    }
}
