//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// These are produced by the total parsing functions of the domain layer
/// (hive tokens, value kinds, paths, values) and never by I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid hive: {0}")]
    InvalidHive(String),

    #[error("Invalid value kind: {0}")]
    InvalidKind(String),

    #[error("Invalid registry path: {0}")]
    InvalidPath(String),

    #[error("Invalid value for {kind}: {input}")]
    InvalidValue { kind: String, input: String },

    #[error("Linked group '{0}' has no items")]
    EmptyGroup(String),

    #[error("Invalid GUID: {0}")]
    InvalidGuid(String),
}

impl DomainError {
    /// Check if this error was caused by an unrecognized hive token
    pub fn is_invalid_hive(&self) -> bool {
        matches!(self, DomainError::InvalidHive(_))
    }
}
