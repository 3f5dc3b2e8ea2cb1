//! In-memory registry
//!
//! A [`RegistryBackend`] over a map of keys, used by `--simulate` and by
//! the integration tests. Access checks evaluate each key's DACL for the
//! simulated user, so ownership takeover and path creation behave as they
//! would against a real hive. Key paths and value names compare
//! case-insensitively.

use regpilot_application::ports::registry_backend::{
    KeyAccess, RegistryBackend, RegistryError, RegistryKey,
};
use regpilot_domain::registry::security::{KEY_QUERY_VALUE, KEY_SET_VALUE};
use regpilot_domain::{Ace, ConfigValue, KeyPath, SecurityDescriptor, Sid};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

/// SID the simulated process runs as unless overridden
pub const SIMULATED_USER_SID: &str = "S-1-5-21-0-0-0-1001";

/// Owner given to keys that are locked against the simulated user
const TRUSTED_INSTALLER_SID: &str = "S-1-5-80-956008885-3418522649-1831038044-1853292631-2271478464";

/// Errors that can occur while loading a registry snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to read snapshot {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid snapshot: {0}")]
    Parse(String),
}

/// One key of a snapshot file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub path: KeyPath,
    #[serde(default)]
    pub values: BTreeMap<String, ConfigValue>,
    /// Readable but not writable by the simulated user
    #[serde(default)]
    pub locked: bool,
}

/// Serializable registry contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub keys: Vec<SnapshotKey>,
}

#[derive(Debug, Clone)]
struct MemoryKey {
    path: KeyPath,
    /// Lowercased name -> (name as written, value)
    values: BTreeMap<String, (String, ConfigValue)>,
    security: SecurityDescriptor,
}

impl MemoryKey {
    fn new(path: KeyPath, security: SecurityDescriptor) -> Self {
        Self {
            path,
            values: BTreeMap::new(),
            security,
        }
    }
}

struct State {
    keys: HashMap<String, MemoryKey>,
}

/// In-memory [`RegistryBackend`]
#[derive(Clone)]
pub struct MemoryRegistry {
    state: Arc<Mutex<State>>,
    user: Sid,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::with_user(Sid::new(SIMULATED_USER_SID))
    }

    pub fn with_user(user: Sid) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                keys: HashMap::new(),
            })),
            user,
        }
    }

    /// Build a registry from a JSON snapshot file
    pub fn from_snapshot_file(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SnapshotError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let snapshot: RegistrySnapshot =
            serde_json::from_str(&content).map_err(|e| SnapshotError::Parse(e.to_string()))?;
        let registry = Self::new();
        registry.load(&snapshot);
        debug!("Loaded {} simulated keys from {}", snapshot.keys.len(), path.display());
        Ok(registry)
    }

    /// Merge `snapshot` into this registry
    pub fn load(&self, snapshot: &RegistrySnapshot) {
        for key in &snapshot.keys {
            self.seed_key(&key.path);
            for (name, value) in &key.values {
                self.seed_value(&key.path, name, value.clone());
            }
            if key.locked {
                self.lock_key(&key.path);
            }
        }
    }

    /// Current contents, keys sorted by path
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.lock();
        let mut keys: Vec<SnapshotKey> = state
            .keys
            .values()
            .map(|k| SnapshotKey {
                path: k.path.clone(),
                values: k.values.values().cloned().collect(),
                locked: !k.security.allows(std::slice::from_ref(&self.user), KEY_SET_VALUE),
            })
            .collect();
        keys.sort_by_key(|k| k.path.cache_key());
        RegistrySnapshot { keys }
    }

    pub fn user(&self) -> &Sid {
        &self.user
    }

    /// Create `key` and any missing ancestors, writable by the user
    pub fn seed_key(&self, key: &KeyPath) {
        let mut state = self.lock();
        for prefix in key.prefixes() {
            state
                .keys
                .entry(prefix.cache_key())
                .or_insert_with(|| MemoryKey::new(prefix.clone(), SecurityDescriptor::full_control(&self.user)));
        }
    }

    pub fn seed_value(&self, key: &KeyPath, name: &str, value: ConfigValue) {
        self.seed_key(key);
        if let Some(node) = self.lock().keys.get_mut(&key.cache_key()) {
            node.values.insert(name.to_lowercase(), (name.to_string(), value));
        }
    }

    /// Hand `key` to another owner, leaving the user read access only
    pub fn lock_key(&self, key: &KeyPath) {
        self.seed_key(key);
        if let Some(node) = self.lock().keys.get_mut(&key.cache_key()) {
            node.security = SecurityDescriptor {
                owner: Some(Sid::new(TRUSTED_INSTALLER_SID)),
                dacl: vec![
                    Ace::allow(self.user.clone(), KEY_QUERY_VALUE),
                    Ace::full_control(Sid::new(TRUSTED_INSTALLER_SID)),
                ],
            };
        }
    }

    pub fn has_key(&self, key: &KeyPath) -> bool {
        key.is_root() || self.lock().keys.contains_key(&key.cache_key())
    }

    pub fn value(&self, key: &KeyPath, name: &str) -> Option<ConfigValue> {
        self.lock()
            .keys
            .get(&key.cache_key())
            .and_then(|k| k.values.get(&name.to_lowercase()))
            .map(|(_, v)| v.clone())
    }

    pub fn security(&self, key: &KeyPath) -> Option<SecurityDescriptor> {
        self.lock().keys.get(&key.cache_key()).map(|k| k.security.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn permits(&self, security: &SecurityDescriptor, access: u32) -> bool {
        security.allows(std::slice::from_ref(&self.user), access)
    }
}

struct MemoryKeyHandle {
    state: Arc<Mutex<State>>,
    path: KeyPath,
    writable: bool,
}

impl MemoryKeyHandle {
    fn with_key<T>(
        &self,
        f: impl FnOnce(&mut MemoryKey) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let node = state
            .keys
            .get_mut(&self.path.cache_key())
            .ok_or_else(|| RegistryError::not_found(&self.path))?;
        f(node)
    }

    fn require_write(&self) -> Result<(), RegistryError> {
        if self.writable {
            Ok(())
        } else {
            Err(RegistryError::access_denied(&self.path))
        }
    }
}

impl RegistryKey for MemoryKeyHandle {
    fn path(&self) -> &KeyPath {
        &self.path
    }

    fn get_value(&self, name: &str) -> Result<Option<ConfigValue>, RegistryError> {
        if self.path.is_root() {
            return Ok(None);
        }
        self.with_key(|node| Ok(node.values.get(&name.to_lowercase()).map(|(_, v)| v.clone())))
    }

    fn set_value(&self, name: &str, value: &ConfigValue) -> Result<(), RegistryError> {
        self.require_write()?;
        self.with_key(|node| {
            node.values
                .insert(name.to_lowercase(), (name.to_string(), value.clone()));
            Ok(())
        })
    }

    fn delete_value(&self, name: &str) -> Result<(), RegistryError> {
        self.require_write()?;
        self.with_key(|node| {
            node.values
                .remove(&name.to_lowercase())
                .map(|_| ())
                .ok_or_else(|| RegistryError::not_found(name))
        })
    }
}

impl RegistryBackend for MemoryRegistry {
    fn open_key(
        &self,
        key: &KeyPath,
        access: KeyAccess,
    ) -> Result<Box<dyn RegistryKey>, RegistryError> {
        if !key.is_root() {
            let state = self.lock();
            let node = state
                .keys
                .get(&key.cache_key())
                .ok_or_else(|| RegistryError::not_found(key))?;
            let needed = match access {
                KeyAccess::Read => KEY_QUERY_VALUE,
                KeyAccess::ReadWrite => KEY_QUERY_VALUE | KEY_SET_VALUE,
            };
            if !self.permits(&node.security, needed) {
                return Err(RegistryError::access_denied(key));
            }
        }
        Ok(Box::new(MemoryKeyHandle {
            state: self.state.clone(),
            path: key.clone(),
            writable: access == KeyAccess::ReadWrite,
        }))
    }

    fn create_subkey(
        &self,
        parent: &KeyPath,
        name: &str,
        security: Option<&SecurityDescriptor>,
    ) -> Result<(), RegistryError> {
        let mut state = self.lock();
        let inherited = if parent.is_root() {
            SecurityDescriptor::full_control(&self.user)
        } else {
            let node = state
                .keys
                .get(&parent.cache_key())
                .ok_or_else(|| RegistryError::not_found(parent))?;
            if !self.permits(&node.security, KEY_SET_VALUE) {
                return Err(RegistryError::access_denied(parent));
            }
            node.security.clone()
        };
        let child = parent.child(name);
        state
            .keys
            .entry(child.cache_key())
            .or_insert_with(|| MemoryKey::new(child.clone(), security.cloned().unwrap_or(inherited)));
        Ok(())
    }

    fn delete_key_tree(&self, key: &KeyPath) -> Result<(), RegistryError> {
        if key.is_root() {
            return Err(RegistryError::InvalidPath(key.to_string()));
        }
        let mut state = self.lock();
        let node = state
            .keys
            .get(&key.cache_key())
            .ok_or_else(|| RegistryError::not_found(key))?;
        if !self.permits(&node.security, KEY_SET_VALUE) {
            return Err(RegistryError::access_denied(key));
        }
        let base = key.cache_key();
        let below = format!("{}\\", base);
        state.keys.retain(|k, _| k != &base && !k.starts_with(&below));
        Ok(())
    }

    fn read_security(&self, key: &KeyPath) -> Result<SecurityDescriptor, RegistryError> {
        self.security(key).ok_or_else(|| RegistryError::not_found(key))
    }

    fn write_security(
        &self,
        key: &KeyPath,
        descriptor: &SecurityDescriptor,
    ) -> Result<(), RegistryError> {
        let mut state = self.lock();
        let node = state
            .keys
            .get_mut(&key.cache_key())
            .ok_or_else(|| RegistryError::not_found(key))?;
        node.security = descriptor.clone();
        Ok(())
    }

    fn current_user_sid(&self) -> Result<Sid, RegistryError> {
        Ok(self.user.clone())
    }
}
