//! Change records published after successful writes

use crate::registry::{ConfigPath, ConfigValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Before/after record of one value written or deleted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    /// Id of the configuration item the write belonged to
    pub item_id: String,
    pub path: ConfigPath,
    pub old_value: Option<ConfigValue>,
    /// `None` when the value (or key) was deleted
    pub new_value: Option<ConfigValue>,
    pub changed_at: DateTime<Utc>,
}

impl ValueChange {
    pub fn new(
        item_id: impl Into<String>,
        path: ConfigPath,
        old_value: Option<ConfigValue>,
        new_value: Option<ConfigValue>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            path,
            old_value,
            new_value,
            changed_at: Utc::now(),
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.new_value.is_none()
    }

    /// True when the write left the value as it was
    pub fn is_noop(&self) -> bool {
        match (&self.old_value, &self.new_value) {
            (Some(old), Some(new)) => old.matches(new),
            (None, None) => true,
            _ => false,
        }
    }
}
