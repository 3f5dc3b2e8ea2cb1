//! Registry backend port
//!
//! Defines the OS-facing primitives the engine composes: opening keys,
//! creating single subkeys with an explicit descriptor, deleting trees and
//! reading/writing security descriptors.

use regpilot_domain::{ConfigValue, DomainError, KeyPath, SecurityDescriptor, Sid};
use thiserror::Error;

/// Errors that can occur during registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid hive: {0}")]
    InvalidHive(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Elevation unavailable: {0}")]
    ElevationUnavailable(String),

    #[error("OS error {code}: {message}")]
    Os { code: i32, message: String },
}

impl RegistryError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        RegistryError::NotFound(what.to_string())
    }

    pub fn access_denied(what: impl std::fmt::Display) -> Self {
        RegistryError::AccessDenied(what.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, RegistryError::AccessDenied(_))
    }
}

impl From<DomainError> for RegistryError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidHive(token) => RegistryError::InvalidHive(token),
            other => RegistryError::InvalidPath(other.to_string()),
        }
    }
}

/// Requested rights when opening a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAccess {
    Read,
    ReadWrite,
}

/// An open key handle
///
/// Closing happens on drop, so every exit path releases the handle.
pub trait RegistryKey: Send {
    /// Path this handle was opened for
    fn path(&self) -> &KeyPath;

    /// Read a value; `Ok(None)` when the value does not exist.
    /// An empty name addresses the key's default value.
    fn get_value(&self, name: &str) -> Result<Option<ConfigValue>, RegistryError>;

    /// Create or overwrite a value
    fn set_value(&self, name: &str, value: &ConfigValue) -> Result<(), RegistryError>;

    /// Delete a value; `NotFound` when it does not exist
    fn delete_value(&self, name: &str) -> Result<(), RegistryError>;
}

/// Port for raw registry access
///
/// Implementations (adapters) live in the infrastructure layer. Calls are
/// synchronous OS operations.
pub trait RegistryBackend: Send + Sync {
    /// Open an existing key.
    ///
    /// Returns `NotFound` when the key does not exist and `AccessDenied`
    /// when it exists but the requested rights are not granted.
    fn open_key(&self, key: &KeyPath, access: KeyAccess)
    -> Result<Box<dyn RegistryKey>, RegistryError>;

    /// Create one subkey directly below `parent`.
    ///
    /// With a descriptor the new key gets exactly that owner and DACL;
    /// without one it inherits from the parent. Creating an existing key is
    /// not an error.
    fn create_subkey(
        &self,
        parent: &KeyPath,
        name: &str,
        security: Option<&SecurityDescriptor>,
    ) -> Result<(), RegistryError>;

    /// Delete a key with all its subkeys and values
    fn delete_key_tree(&self, key: &KeyPath) -> Result<(), RegistryError>;

    /// Read owner and DACL, opening with the broadest right available
    fn read_security(&self, key: &KeyPath) -> Result<SecurityDescriptor, RegistryError>;

    /// Replace owner and DACL
    fn write_security(
        &self,
        key: &KeyPath,
        descriptor: &SecurityDescriptor,
    ) -> Result<(), RegistryError>;

    /// SID of the user this process runs as
    fn current_user_sid(&self) -> Result<Sid, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_conversion() {
        let err: RegistryError = DomainError::InvalidHive("HKXX".into()).into();
        assert_eq!(err, RegistryError::InvalidHive("HKXX".into()));

        let err: RegistryError = DomainError::InvalidPath("".into()).into();
        assert!(matches!(err, RegistryError::InvalidPath(_)));
    }

    #[test]
    fn test_classification_helpers() {
        assert!(RegistryError::not_found("HKCU\\X").is_not_found());
        assert!(RegistryError::access_denied("HKCU\\X").is_access_denied());
        assert!(!RegistryError::access_denied("HKCU\\X").is_not_found());
    }
}
