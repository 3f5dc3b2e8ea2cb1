//! Check Status use case.
//!
//! Classifies every item of a setting and combines the results. Registry
//! reads are blocking OS calls, so each item runs on the blocking pool and
//! the items of a setting are awaited together.

use crate::engine::StatusClassifier;
use futures::future::join_all;
use regpilot_domain::{CombinationPolicy, ConfigValue, ConfigurationItem, Setting, Status, combine};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Status of one item plus what the registry currently holds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStatus {
    pub item_id: String,
    pub name: String,
    pub path: String,
    pub status: Status,
    pub current_value: Option<ConfigValue>,
}

impl ItemStatus {
    fn error(item: &ConfigurationItem) -> Self {
        Self {
            item_id: item.id.clone(),
            name: item.name.clone(),
            path: item.path.to_string(),
            status: Status::Error,
            current_value: None,
        }
    }
}

/// Combined status of one setting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub setting_id: String,
    pub name: String,
    /// `None` for single-item settings
    pub policy: Option<CombinationPolicy>,
    pub status: Status,
    pub items: Vec<ItemStatus>,
}

pub struct CheckStatusUseCase {
    classifier: Arc<StatusClassifier>,
}

impl CheckStatusUseCase {
    pub fn new(classifier: Arc<StatusClassifier>) -> Self {
        Self { classifier }
    }

    pub async fn execute(&self, setting: &Setting) -> StatusReport {
        let items = setting.items();
        let tasks = items.iter().cloned().map(|item| {
            let classifier = self.classifier.clone();
            tokio::task::spawn_blocking(move || classify(&classifier, &item))
        });

        let results: Vec<ItemStatus> = join_all(tasks)
            .await
            .into_iter()
            .zip(items)
            .map(|(joined, item)| {
                joined.unwrap_or_else(|e| {
                    warn!("Status task for {} did not complete: {}", item.id, e);
                    ItemStatus::error(item)
                })
            })
            .collect();

        let statuses: Vec<Status> = results.iter().map(|r| r.status).collect();
        let (policy, status) = match setting {
            Setting::Single(_) => (None, statuses.first().copied().unwrap_or(Status::Unknown)),
            Setting::Linked(group) => (Some(group.policy), combine(group, &statuses)),
        };
        debug!("{} is {}", setting.id(), status);

        StatusReport {
            setting_id: setting.id().to_string(),
            name: setting.name().to_string(),
            policy,
            status,
            items: results,
        }
    }

    /// Reports for several settings, in input order
    pub async fn execute_many(&self, settings: &[Setting]) -> Vec<StatusReport> {
        join_all(settings.iter().map(|s| self.execute(s))).await
    }
}

fn classify(classifier: &StatusClassifier, item: &ConfigurationItem) -> ItemStatus {
    let status = classifier.status(item);
    let current_value = if status == Status::Error || item.value_name().is_none() {
        None
    } else {
        classifier.store().cached_value(&item.path).ok().flatten()
    };
    ItemStatus {
        item_id: item.id.clone(),
        name: item.name.clone(),
        path: item.path.to_string(),
        status,
        current_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineParams;
    use crate::engine::RegistryEngine;
    use crate::test_support::{MockExecutor, MockRegistry};
    use regpilot_domain::{ConfigPath, Hive, KeyPath, LinkedConfigurationGroup};

    fn use_case(registry: &MockRegistry) -> CheckStatusUseCase {
        let engine = RegistryEngine::new(
            Arc::new(registry.clone()),
            Arc::new(MockExecutor::new()),
            &EngineParams::default(),
        );
        CheckStatusUseCase::new(engine.classifier)
    }

    fn item(hive: Hive, id: &str) -> ConfigurationItem {
        ConfigurationItem::new(id, ConfigPath::new(KeyPath::new(hive, "Software\\X"), "Y"))
            .with_enabled_value(1u32)
            .with_disabled_value(0u32)
    }

    #[tokio::test]
    async fn test_single_item_report() {
        let registry = MockRegistry::new();
        registry.seed_value(&KeyPath::new(Hive::CurrentUser, "Software\\X"), "Y", ConfigValue::Dword(1));

        let report = use_case(&registry)
            .execute(&Setting::Single(item(Hive::CurrentUser, "a")))
            .await;
        assert_eq!(report.status, Status::Applied);
        assert_eq!(report.policy, None);
        assert_eq!(report.items[0].current_value, Some(ConfigValue::Dword(1)));
        assert_eq!(report.items[0].path, "HKCU\\Software\\X [Y]");
    }

    #[tokio::test]
    async fn test_linked_report_combines() {
        let registry = MockRegistry::new();
        registry.seed_value(&KeyPath::new(Hive::CurrentUser, "Software\\X"), "Y", ConfigValue::Dword(1));
        let group = |policy| {
            Setting::Linked(
                LinkedConfigurationGroup::new(
                    "g",
                    vec![item(Hive::CurrentUser, "user"), item(Hive::LocalMachine, "machine")],
                    policy,
                )
                .unwrap(),
            )
        };
        let use_case = use_case(&registry);

        let reports = use_case
            .execute_many(&[
                group(CombinationPolicy::All),
                group(CombinationPolicy::Any),
                group(CombinationPolicy::Custom),
            ])
            .await;
        assert_eq!(reports[0].status, Status::Modified);
        assert_eq!(reports[1].status, Status::Applied);
        assert_eq!(reports[2].status, Status::Applied);
        assert_eq!(reports[0].items[1].status, Status::NotApplied);
    }
}
