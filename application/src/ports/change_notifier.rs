//! Port for publishing value-change records.
//!
//! After a successful write the apply workflow publishes a
//! [`ValueChange`] for external subscribers (UI refresh, audit log).
//! Publishing failures are logged by the caller and never fail the write.

use regpilot_domain::ValueChange;
use thiserror::Error;

/// Errors that can occur while publishing a change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Channel closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Port for the process-wide change event channel.
pub trait ChangeNotifier: Send + Sync {
    /// Publish one change record.
    fn publish(&self, change: &ValueChange) -> Result<(), NotifyError>;
}

/// No-op implementation for tests and when notifications are disabled.
pub struct NoChangeNotifier;

impl ChangeNotifier for NoChangeNotifier {
    fn publish(&self, _change: &ValueChange) -> Result<(), NotifyError> {
        Ok(())
    }
}
