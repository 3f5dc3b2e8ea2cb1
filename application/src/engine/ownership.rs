//! Ownership escalation for keys that exist but refuse write access.

use crate::ports::registry_backend::RegistryBackend;
use regpilot_domain::KeyPath;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Rewrites a key's owner and DACL so the current user can write it.
///
/// The new DACL starts with full-control allow entries for the current
/// user, Administrators and SYSTEM, followed by the entries the key already
/// had. The step is best effort: callers retry their original operation
/// afterwards and treat a second failure as final.
pub struct OwnershipEscalator {
    backend: Arc<dyn RegistryBackend>,
    attempts: AtomicUsize,
}

impl OwnershipEscalator {
    pub fn new(backend: Arc<dyn RegistryBackend>) -> Self {
        Self {
            backend,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Take ownership of `key`. Never fails loudly; `false` means the
    /// descriptor could not be rewritten and the reason has been logged.
    pub fn take_ownership(&self, key: &KeyPath) -> bool {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        let user = match self.backend.current_user_sid() {
            Ok(sid) => sid,
            Err(e) => {
                warn!("Ownership of {}: cannot resolve current user: {}", key, e);
                return false;
            }
        };

        let current = match self.backend.read_security(key) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Ownership of {}: cannot read security descriptor: {}", key, e);
                return false;
            }
        };

        let rewritten = current.taken_over_by(&user);
        if let Err(e) = self.backend.write_security(key, &rewritten) {
            warn!("Ownership of {}: cannot write security descriptor: {}", key, e);
            return false;
        }

        debug!("Took ownership of {} for {}", key, user);
        true
    }

    /// Number of takeover attempts since construction
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockRegistry, USER_SID};
    use regpilot_domain::registry::security::KEY_QUERY_VALUE;
    use regpilot_domain::{Hive, SecurityDescriptor, Sid};

    #[test]
    fn test_takeover_grants_user_write_access() {
        let registry = MockRegistry::new();
        let key = KeyPath::new(Hive::LocalMachine, "SOFTWARE\\Locked");
        registry.lock_key(&key);
        let escalator = OwnershipEscalator::new(Arc::new(registry.clone()));

        assert!(escalator.take_ownership(&key));
        assert_eq!(escalator.attempts(), 1);

        let user = Sid::new(USER_SID);
        let descriptor = registry.security(&key).unwrap();
        assert_eq!(descriptor.owner, Some(user.clone()));
        assert_eq!(descriptor.dacl[..3], SecurityDescriptor::takeover_entries(&user)[..]);
        // The existing SYSTEM entry duplicates a prepended one and is dropped
        assert_eq!(descriptor.dacl.len(), 4);
        assert_eq!(descriptor.dacl[3].access_mask, KEY_QUERY_VALUE);
    }

    #[test]
    fn test_repeated_takeover_does_not_grow_dacl() {
        let registry = MockRegistry::new();
        let key = KeyPath::new(Hive::LocalMachine, "SOFTWARE\\Locked");
        registry.lock_key(&key);
        let escalator = OwnershipEscalator::new(Arc::new(registry.clone()));

        assert!(escalator.take_ownership(&key));
        let first = registry.security(&key).unwrap().dacl.len();
        assert!(escalator.take_ownership(&key));
        assert_eq!(registry.security(&key).unwrap().dacl.len(), first);
    }

    #[test]
    fn test_failure_returns_false() {
        let registry = MockRegistry::new();
        let key = KeyPath::new(Hive::LocalMachine, "SOFTWARE\\Locked");
        registry.lock_key(&key);
        registry.fail_security_writes();
        let escalator = OwnershipEscalator::new(Arc::new(registry.clone()));

        assert!(!escalator.take_ownership(&key));
        assert_eq!(registry.security_writes(), 1);
    }

    #[test]
    fn test_missing_key_returns_false() {
        let registry = MockRegistry::new();
        let escalator = OwnershipEscalator::new(Arc::new(registry));
        assert!(!escalator.take_ownership(&KeyPath::new(Hive::CurrentUser, "Nope")));
    }
}
