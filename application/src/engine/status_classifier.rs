//! Status classifier
//!
//! Compares one [`ConfigurationItem`] with the live registry. The decision
//! is re-derived on every call from cached reads:
//!
//! 1. Key missing: Remove items and `absence_means_enabled` items are
//!    `Applied`, everything else `NotApplied`.
//! 2. Value missing: same rule, applied to the value.
//! 3. Remove item whose key/value is present: `NotApplied`.
//! 4. Current value unreadable: `NotApplied`.
//! 5. Matches the enable target: `Applied`.
//! 6. Matches the disable target: `NotApplied`.
//! 7. Anything else: `Modified`.
//!
//! Any backend error other than not-found short-circuits to `Error`.

use super::value_store::ValueStore;
use crate::ports::registry_backend::RegistryError;
use regpilot_domain::{ActionType, ConfigurationItem, LinkedConfigurationGroup, Status, combine};
use std::sync::Arc;
use tracing::{trace, warn};

pub struct StatusClassifier {
    store: Arc<ValueStore>,
}

impl StatusClassifier {
    pub fn new(store: Arc<ValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ValueStore> {
        &self.store
    }

    /// Status of one item; OS errors become [`Status::Error`]
    pub fn status(&self, item: &ConfigurationItem) -> Status {
        match self.try_status(item) {
            Ok(status) => {
                trace!("{} is {}", item.id, status);
                status
            }
            Err(e) => {
                warn!("Status check for {} failed: {}", item.id, e);
                Status::Error
            }
        }
    }

    /// Status of every item, in order
    pub fn statuses(&self, items: &[ConfigurationItem]) -> Vec<Status> {
        items.iter().map(|item| self.status(item)).collect()
    }

    /// Classify every item of `group`, then combine under its policy
    pub fn group_status(&self, group: &LinkedConfigurationGroup) -> Status {
        combine(group, &self.statuses(&group.items))
    }

    pub fn try_status(&self, item: &ConfigurationItem) -> Result<Status, RegistryError> {
        let is_remove = item.action == ActionType::Remove;
        let when_absent = if is_remove || item.absence_means_enabled {
            Status::Applied
        } else {
            Status::NotApplied
        };

        // A GUID-named Remove item is tracked by the presence of its subkey
        if is_remove && let Some(subkey) = item.guid_subkey() {
            return Ok(if self.store.try_key_exists(&subkey)? {
                Status::NotApplied
            } else {
                Status::Applied
            });
        }

        if !self.store.try_key_exists(item.key())? {
            return Ok(when_absent);
        }

        // Key-only items are satisfied by the key alone
        if item.value_name().is_none() {
            return Ok(if is_remove { Status::NotApplied } else { Status::Applied });
        }

        if !self.store.try_value_exists(&item.path)? {
            return Ok(when_absent);
        }

        if is_remove {
            return Ok(Status::NotApplied);
        }

        let Some(current) = self.store.cached_value(&item.path)? else {
            return Ok(Status::NotApplied);
        };

        if item.enable_target().is_some_and(|target| current.matches(target)) {
            return Ok(Status::Applied);
        }
        if item.disable_target().is_some_and(|target| current.matches(target)) {
            return Ok(Status::NotApplied);
        }
        Ok(Status::Modified)
    }
}
