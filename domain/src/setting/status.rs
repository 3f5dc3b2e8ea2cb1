//! Setting status
//!
//! Statuses are re-derived on every query and never persisted.

use serde::{Deserialize, Serialize};

/// How the live system relates to a configuration item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The system matches the enabled state
    Applied,
    /// The system matches the disabled state
    NotApplied,
    /// The system holds a value matching neither state
    Modified,
    /// Status could not be determined
    Unknown,
    /// Reading the system failed
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Applied => "applied",
            Status::NotApplied => "not_applied",
            Status::Modified => "modified",
            Status::Unknown => "unknown",
            Status::Error => "error",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Status::Applied)
    }

    /// Status expected after successfully applying `enable`
    pub fn expected_after(enable: bool) -> Self {
        if enable {
            Status::Applied
        } else {
            Status::NotApplied
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
