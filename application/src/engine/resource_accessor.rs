//! Resource accessor
//!
//! Opens keys for reading or writing. Write opens recover from access
//! denial through the [`OwnershipEscalator`] and build missing paths one
//! segment at a time.

use super::ownership::OwnershipEscalator;
use crate::ports::registry_backend::{KeyAccess, RegistryBackend, RegistryError, RegistryKey};
use regpilot_domain::{KeyPath, SecurityDescriptor};
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens and creates registry keys
pub struct ResourceAccessor {
    backend: Arc<dyn RegistryBackend>,
    escalator: OwnershipEscalator,
}

impl ResourceAccessor {
    pub fn new(backend: Arc<dyn RegistryBackend>) -> Self {
        Self {
            escalator: OwnershipEscalator::new(backend.clone()),
            backend,
        }
    }

    pub fn backend(&self) -> &Arc<dyn RegistryBackend> {
        &self.backend
    }

    pub fn escalator(&self) -> &OwnershipEscalator {
        &self.escalator
    }

    /// Open `key`; read-write opens create the key when it is missing
    pub fn open(&self, key: &KeyPath, access: KeyAccess) -> Result<Box<dyn RegistryKey>, RegistryError> {
        match access {
            KeyAccess::Read => self.open_read(key),
            KeyAccess::ReadWrite => self.open_write(key),
        }
    }

    /// Open for reading. A key that cannot be read is reported as missing.
    pub fn open_read(&self, key: &KeyPath) -> Result<Box<dyn RegistryKey>, RegistryError> {
        self.backend
            .open_key(key, KeyAccess::Read)
            .map_err(|e| match e {
                RegistryError::NotFound(_) | RegistryError::AccessDenied(_) => {
                    RegistryError::not_found(key)
                }
                other => other,
            })
    }

    /// Open an existing key for writing, taking ownership once on denial.
    /// Never creates the key.
    pub fn open_existing_write(&self, key: &KeyPath) -> Result<Box<dyn RegistryKey>, RegistryError> {
        match self.backend.open_key(key, KeyAccess::ReadWrite) {
            Err(RegistryError::AccessDenied(reason)) => {
                debug!("Write access to {} denied ({}), escalating", key, reason);
                if !self.escalator.take_ownership(key) {
                    return Err(RegistryError::AccessDenied(reason));
                }
                self.backend.open_key(key, KeyAccess::ReadWrite)
            }
            other => other,
        }
    }

    /// Open for writing, creating the key and any missing ancestors
    pub fn open_write(&self, key: &KeyPath) -> Result<Box<dyn RegistryKey>, RegistryError> {
        match self.open_existing_write(key) {
            Err(RegistryError::NotFound(_)) => {
                self.create_path(key)?;
                self.open_existing_write(key)
            }
            other => other,
        }
    }

    /// Whether `key` exists. A key that denies reading still exists.
    pub fn key_exists(&self, key: &KeyPath) -> Result<bool, RegistryError> {
        if key.is_root() {
            return Ok(true);
        }
        match self.backend.open_key(key, KeyAccess::Read) {
            Ok(_) => Ok(true),
            Err(RegistryError::NotFound(_)) => Ok(false),
            Err(RegistryError::AccessDenied(_)) => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Create every missing segment of `key`.
    ///
    /// Starts below the deepest existing ancestor. Each new segment gets an
    /// explicit descriptor giving the current user, Administrators and
    /// SYSTEM full control, so deeper segments never need escalation.
    pub fn create_path(&self, key: &KeyPath) -> Result<(), RegistryError> {
        let prefixes = key.prefixes();
        let mut start = 0;
        for (idx, prefix) in prefixes.iter().enumerate().rev() {
            if self.key_exists(prefix)? {
                start = idx + 1;
                break;
            }
        }
        if start == prefixes.len() {
            return Ok(());
        }

        let user = self.backend.current_user_sid()?;
        let descriptor = SecurityDescriptor::full_control(&user);

        for prefix in &prefixes[start..] {
            let (Some(parent), Some(name)) = (prefix.parent(), prefix.name()) else {
                continue;
            };
            self.create_segment(&parent, name, &descriptor)?;
            debug!("Created {}", prefix);
        }
        Ok(())
    }

    fn create_segment(
        &self,
        parent: &KeyPath,
        name: &str,
        descriptor: &SecurityDescriptor,
    ) -> Result<(), RegistryError> {
        match self.backend.create_subkey(parent, name, Some(descriptor)) {
            Err(RegistryError::AccessDenied(reason)) if !parent.is_root() => {
                if !self.escalator.take_ownership(parent) {
                    warn!("Cannot create {} under {}: {}", name, parent, reason);
                    return Err(RegistryError::AccessDenied(reason));
                }
                self.backend.create_subkey(parent, name, Some(descriptor))
            }
            other => other,
        }
    }
}
