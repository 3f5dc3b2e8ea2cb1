//! Change notifier adapters
//!
//! - [`BroadcastChangeNotifier`]: in-process `tokio` broadcast channel
//! - [`JsonlChangeLog`]: append-only JSONL audit file
//! - [`FanoutChangeNotifier`]: publishes to several notifiers

mod broadcast;
mod fanout;
mod jsonl;

pub use broadcast::BroadcastChangeNotifier;
pub use fanout::FanoutChangeNotifier;
pub use jsonl::JsonlChangeLog;
