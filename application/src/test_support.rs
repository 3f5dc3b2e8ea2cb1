//! Test doubles shared by the engine and use case tests.

use crate::ports::command_executor::{CommandError, CommandExecutor, CommandLine, CommandOutput};
use crate::ports::registry_backend::{KeyAccess, RegistryBackend, RegistryError, RegistryKey};
use async_trait::async_trait;
use regpilot_domain::registry::security::{KEY_QUERY_VALUE, KEY_SET_VALUE};
use regpilot_domain::{Ace, ConfigValue, KeyPath, SecurityDescriptor, Sid};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const USER_SID: &str = "S-1-5-21-1000-1001";

#[derive(Default)]
struct MockKey {
    values: HashMap<String, ConfigValue>,
    security: SecurityDescriptor,
}

#[derive(Default)]
struct Shared {
    keys: Mutex<HashMap<String, MockKey>>,
    /// Keys whose values silently ignore writes
    swallow_writes: Mutex<HashSet<String>>,
    /// Keys whose value writes are always denied, whatever the DACL says
    protected: Mutex<HashSet<String>>,
    /// Keys whose opens fail with an OS error
    broken: Mutex<HashSet<String>>,
    fail_security_writes: AtomicBool,
    security_writes: AtomicUsize,
}

/// In-memory registry with DACL checks and failure injection
#[derive(Clone, Default)]
pub struct MockRegistry {
    shared: Arc<Shared>,
}

fn user() -> Sid {
    Sid::new(USER_SID)
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `key` and all ancestors, writable by the user
    pub fn seed_key(&self, key: &KeyPath) {
        let mut keys = self.shared.keys.lock().unwrap();
        for prefix in key.prefixes() {
            keys.entry(prefix.cache_key()).or_insert_with(|| MockKey {
                values: HashMap::new(),
                security: SecurityDescriptor::full_control(&user()),
            });
        }
    }

    pub fn seed_value(&self, key: &KeyPath, name: &str, value: ConfigValue) {
        self.seed_key(key);
        let mut keys = self.shared.keys.lock().unwrap();
        if let Some(k) = keys.get_mut(&key.cache_key()) {
            k.values.insert(name.to_lowercase(), value);
        }
    }

    /// Make `key` readable but not writable by the user
    pub fn lock_key(&self, key: &KeyPath) {
        self.seed_key(key);
        let mut keys = self.shared.keys.lock().unwrap();
        if let Some(k) = keys.get_mut(&key.cache_key()) {
            k.security = SecurityDescriptor {
                owner: Some(Sid::new("S-1-5-80-956008885")),
                dacl: vec![
                    Ace::allow(user(), KEY_QUERY_VALUE),
                    Ace::full_control(Sid::local_system()),
                ],
            };
        }
    }

    pub fn protect_key(&self, key: &KeyPath) {
        self.shared.protected.lock().unwrap().insert(key.cache_key());
    }

    pub fn swallow_writes(&self, key: &KeyPath) {
        self.shared.swallow_writes.lock().unwrap().insert(key.cache_key());
    }

    pub fn break_key(&self, key: &KeyPath) {
        self.shared.broken.lock().unwrap().insert(key.cache_key());
    }

    pub fn fail_security_writes(&self) {
        self.shared.fail_security_writes.store(true, Ordering::SeqCst);
    }

    pub fn security_writes(&self) -> usize {
        self.shared.security_writes.load(Ordering::SeqCst)
    }

    pub fn has_key(&self, key: &KeyPath) -> bool {
        self.shared.keys.lock().unwrap().contains_key(&key.cache_key())
    }

    pub fn value(&self, key: &KeyPath, name: &str) -> Option<ConfigValue> {
        self.shared
            .keys
            .lock()
            .unwrap()
            .get(&key.cache_key())
            .and_then(|k| k.values.get(&name.to_lowercase()).cloned())
    }

    pub fn security(&self, key: &KeyPath) -> Option<SecurityDescriptor> {
        self.shared
            .keys
            .lock()
            .unwrap()
            .get(&key.cache_key())
            .map(|k| k.security.clone())
    }
}

struct MockHandle {
    shared: Arc<Shared>,
    path: KeyPath,
    writable: bool,
}

impl RegistryKey for MockHandle {
    fn path(&self) -> &KeyPath {
        &self.path
    }

    fn get_value(&self, name: &str) -> Result<Option<ConfigValue>, RegistryError> {
        let keys = self.shared.keys.lock().unwrap();
        let key = keys
            .get(&self.path.cache_key())
            .ok_or_else(|| RegistryError::not_found(&self.path))?;
        Ok(key.values.get(&name.to_lowercase()).cloned())
    }

    fn set_value(&self, name: &str, value: &ConfigValue) -> Result<(), RegistryError> {
        if !self.writable || self.shared.protected.lock().unwrap().contains(&self.path.cache_key()) {
            return Err(RegistryError::access_denied(&self.path));
        }
        if self.shared.swallow_writes.lock().unwrap().contains(&self.path.cache_key()) {
            return Ok(());
        }
        let mut keys = self.shared.keys.lock().unwrap();
        let key = keys
            .get_mut(&self.path.cache_key())
            .ok_or_else(|| RegistryError::not_found(&self.path))?;
        key.values.insert(name.to_lowercase(), value.clone());
        Ok(())
    }

    fn delete_value(&self, name: &str) -> Result<(), RegistryError> {
        if !self.writable {
            return Err(RegistryError::access_denied(&self.path));
        }
        let mut keys = self.shared.keys.lock().unwrap();
        let key = keys
            .get_mut(&self.path.cache_key())
            .ok_or_else(|| RegistryError::not_found(&self.path))?;
        key.values
            .remove(&name.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| RegistryError::not_found(name))
    }
}

impl RegistryBackend for MockRegistry {
    fn open_key(
        &self,
        key: &KeyPath,
        access: KeyAccess,
    ) -> Result<Box<dyn RegistryKey>, RegistryError> {
        if self.shared.broken.lock().unwrap().contains(&key.cache_key()) {
            return Err(RegistryError::Os {
                code: 1015,
                message: "The registry is corrupted".into(),
            });
        }
        let keys = self.shared.keys.lock().unwrap();
        if !key.is_root() {
            let node = keys
                .get(&key.cache_key())
                .ok_or_else(|| RegistryError::not_found(key))?;
            let needed = match access {
                KeyAccess::Read => KEY_QUERY_VALUE,
                KeyAccess::ReadWrite => KEY_QUERY_VALUE | KEY_SET_VALUE,
            };
            if !node.security.allows(&[user()], needed) {
                return Err(RegistryError::access_denied(key));
            }
        }
        Ok(Box::new(MockHandle {
            shared: self.shared.clone(),
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
        let mut keys = self.shared.keys.lock().unwrap();
        let inherited = if parent.is_root() {
            SecurityDescriptor::full_control(&user())
        } else {
            let node = keys
                .get(&parent.cache_key())
                .ok_or_else(|| RegistryError::not_found(parent))?;
            if !node.security.allows(&[user()], KEY_SET_VALUE) {
                return Err(RegistryError::access_denied(parent));
            }
            node.security.clone()
        };
        keys.entry(parent.child(name).cache_key()).or_insert_with(|| MockKey {
            values: HashMap::new(),
            security: security.cloned().unwrap_or(inherited),
        });
        Ok(())
    }

    fn delete_key_tree(&self, key: &KeyPath) -> Result<(), RegistryError> {
        let mut keys = self.shared.keys.lock().unwrap();
        let node = keys
            .get(&key.cache_key())
            .ok_or_else(|| RegistryError::not_found(key))?;
        if !node.security.allows(&[user()], KEY_SET_VALUE) {
            return Err(RegistryError::access_denied(key));
        }
        let base = key.cache_key();
        let below = format!("{}\\", base);
        keys.retain(|k, _| k != &base && !k.starts_with(&below));
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
        self.shared.security_writes.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_security_writes.load(Ordering::SeqCst) {
            return Err(RegistryError::access_denied(key));
        }
        let mut keys = self.shared.keys.lock().unwrap();
        let node = keys
            .get_mut(&key.cache_key())
            .ok_or_else(|| RegistryError::not_found(key))?;
        node.security = descriptor.clone();
        Ok(())
    }

    fn current_user_sid(&self) -> Result<Sid, RegistryError> {
        Ok(user())
    }
}

/// Executor replaying scripted results and recording every call
#[derive(Default)]
pub struct MockExecutor {
    elevated: Mutex<VecDeque<Result<CommandOutput, CommandError>>>,
    plain: Mutex<VecDeque<Result<CommandOutput, CommandError>>>,
    pub calls: Mutex<Vec<(bool, CommandLine)>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_elevated(&self, result: Result<CommandOutput, CommandError>) {
        self.elevated.lock().unwrap().push_back(result);
    }

    pub fn push_plain(&self, result: Result<CommandOutput, CommandError>) {
        self.plain.lock().unwrap().push_back(result);
    }

    pub fn elevated_calls(&self) -> usize {
        self.calls.lock().unwrap().iter().filter(|(e, _)| *e).count()
    }

    pub fn plain_calls(&self) -> usize {
        self.calls.lock().unwrap().iter().filter(|(e, _)| !*e).count()
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn execute(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push((false, command.clone()));
        self.plain
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::success("")))
    }

    async fn execute_elevated(
        &self,
        command: &CommandLine,
    ) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push((true, command.clone()));
        self.elevated
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::success("")))
    }
}
