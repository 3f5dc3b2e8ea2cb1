//! Value store
//!
//! Value-level get/set/delete/exists operations composed from the
//! [`ResourceAccessor`]. Every operation comes in two forms: `try_*`
//! returns the [`RegistryError`] for callers that classify failures, the
//! plain form logs the failure and returns `bool`/`Option`.
//!
//! Writes never re-read to verify; that is the apply workflow's job.

use super::resource_accessor::ResourceAccessor;
use crate::ports::read_cache::ReadCache;
use crate::ports::registry_backend::RegistryError;
use regpilot_domain::{ConfigPath, ConfigValue, KeyPath};
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub struct ValueStore {
    accessor: Arc<ResourceAccessor>,
    cache: Arc<dyn ReadCache>,
}

/// Value name used for reads and writes; key-only paths address the
/// default value
fn value_name(path: &ConfigPath) -> &str {
    path.value_name().unwrap_or("")
}

impl ValueStore {
    pub fn new(accessor: Arc<ResourceAccessor>, cache: Arc<dyn ReadCache>) -> Self {
        Self { accessor, cache }
    }

    pub fn accessor(&self) -> &Arc<ResourceAccessor> {
        &self.accessor
    }

    pub fn cache(&self) -> &Arc<dyn ReadCache> {
        &self.cache
    }

    // ==================== Reads ====================

    /// Read a value directly, bypassing the cache
    pub fn try_get_value(&self, path: &ConfigPath) -> Result<Option<ConfigValue>, RegistryError> {
        match self.accessor.open_read(&path.key) {
            Ok(handle) => handle.get_value(value_name(path)),
            Err(RegistryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read a value directly; `None` for a missing key, a missing value or
    /// any OS error
    pub fn get_value(&self, path: &ConfigPath) -> Option<ConfigValue> {
        self.try_get_value(path).unwrap_or_else(|e| {
            warn!("Failed to read {}: {}", path, e);
            None
        })
    }

    /// Read a value through the cache
    pub fn cached_value(&self, path: &ConfigPath) -> Result<Option<ConfigValue>, RegistryError> {
        if let Some(hit) = self.cache.value(path) {
            return Ok(hit);
        }
        let value = self.try_get_value(path)?;
        self.cache.put_value(path, value.clone());
        Ok(value)
    }

    pub fn try_key_exists(&self, key: &KeyPath) -> Result<bool, RegistryError> {
        if let Some(hit) = self.cache.key_exists(key) {
            return Ok(hit);
        }
        let exists = self.accessor.key_exists(key)?;
        self.cache.put_key_exists(key, exists);
        Ok(exists)
    }

    pub fn key_exists(&self, key: &KeyPath) -> bool {
        self.try_key_exists(key).unwrap_or_else(|e| {
            warn!("Failed to check {}: {}", key, e);
            false
        })
    }

    /// Whether the value exists. For a key-only path this is key existence.
    pub fn try_value_exists(&self, path: &ConfigPath) -> Result<bool, RegistryError> {
        if path.value_name().is_none() {
            return self.try_key_exists(&path.key);
        }
        if let Some(hit) = self.cache.value_exists(path) {
            return Ok(hit);
        }
        let exists = self.try_key_exists(&path.key)? && self.cached_value(path)?.is_some();
        self.cache.put_value_exists(path, exists);
        Ok(exists)
    }

    pub fn value_exists(&self, path: &ConfigPath) -> bool {
        self.try_value_exists(path).unwrap_or_else(|e| {
            warn!("Failed to check {}: {}", path, e);
            false
        })
    }

    // ==================== Writes ====================

    /// Write a value, creating the key and taking ownership as needed
    pub fn try_set_value(&self, path: &ConfigPath, value: &ConfigValue) -> Result<(), RegistryError> {
        let result = self
            .accessor
            .open_write(&path.key)
            .and_then(|handle| handle.set_value(value_name(path), value));
        self.cache.invalidate_key(&path.key);
        result?;
        debug!("Set {} = {}", path, value);
        Ok(())
    }

    pub fn set_value(&self, path: &ConfigPath, value: &ConfigValue) -> bool {
        self.try_set_value(path, value)
            .map_err(|e| warn!("Failed to set {}: {}", path, e))
            .is_ok()
    }

    /// Delete a value. A value or key that is already gone is success.
    pub fn try_delete_value(&self, path: &ConfigPath) -> Result<(), RegistryError> {
        let handle = match self.accessor.open_existing_write(&path.key) {
            Ok(handle) => handle,
            Err(RegistryError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        let result = match handle.delete_value(value_name(path)) {
            Err(RegistryError::NotFound(_)) => Ok(()),
            other => other,
        };
        self.cache.invalidate_key(&path.key);
        result?;
        debug!("Deleted {}", path);
        Ok(())
    }

    pub fn delete_value(&self, path: &ConfigPath) -> bool {
        self.try_delete_value(path)
            .map_err(|e| warn!("Failed to delete {}: {}", path, e))
            .is_ok()
    }

    pub fn try_create_key(&self, key: &KeyPath) -> Result<(), RegistryError> {
        let result = self.accessor.create_path(key);
        self.cache.invalidate_key(key);
        result
    }

    pub fn create_key(&self, key: &KeyPath) -> bool {
        self.try_create_key(key)
            .map_err(|e| warn!("Failed to create {}: {}", key, e))
            .is_ok()
    }

    /// Delete a key with its subtree. A missing key is success.
    pub fn try_delete_key(&self, key: &KeyPath) -> Result<(), RegistryError> {
        if key.is_root() {
            return Err(RegistryError::InvalidPath(format!("refusing to delete hive root {}", key)));
        }
        let result = self.delete_tree(key);
        self.cache.invalidate_key(key);
        result
    }

    pub fn delete_key(&self, key: &KeyPath) -> bool {
        self.try_delete_key(key)
            .map_err(|e| warn!("Failed to delete {}: {}", key, e))
            .is_ok()
    }

    fn delete_tree(&self, key: &KeyPath) -> Result<(), RegistryError> {
        let backend = self.accessor.backend();
        match backend.delete_key_tree(key) {
            Ok(()) | Err(RegistryError::NotFound(_)) => Ok(()),
            Err(RegistryError::AccessDenied(reason)) => {
                trace!("Delete of {} denied ({}), escalating", key, reason);
                if !self.accessor.escalator().take_ownership(key) {
                    return Err(RegistryError::AccessDenied(reason));
                }
                match backend.delete_key_tree(key) {
                    Err(RegistryError::NotFound(_)) => Ok(()),
                    other => other,
                }
            }
            Err(e) => Err(e),
        }
    }
}
