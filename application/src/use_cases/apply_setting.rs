//! Apply Setting use case.
//!
//! Moves one setting (a single item or a linked group) to its enabled or
//! disabled state.
//!
//! Per item the write is chosen from the item's action:
//!
//! | Item | enable | disable |
//! |------|--------|---------|
//! | Remove, GUID name | create GUID subkey | delete GUID subkey |
//! | Remove | create value (or key) | delete value (or key) |
//! | Group policy | delete policy key | write disable target |
//! | Ordinary | write enable target | write disable target, else delete value |
//!
//! Direct writes are re-read. A write that was denied after ownership
//! takeover, or that did not stick, goes to the privileged fallback exactly
//! once. Failures are recorded per item and never stop the remaining items.

use crate::config::EngineParams;
use crate::engine::{RegistryEngine, ValueStore};
use crate::ports::apply_progress::{ApplyProgressNotifier, NoApplyProgress};
use crate::ports::change_notifier::{ChangeNotifier, NoChangeNotifier};
use crate::ports::registry_backend::RegistryError;
use regpilot_domain::{
    ActionType, CombinationPolicy, ConfigPath, ConfigValue, ConfigurationItem, KeyPath,
    LinkedConfigurationGroup, Setting, ValueChange,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How an item's write was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMethod {
    /// Nothing was written
    None,
    /// Registry API in process
    Direct,
    /// Out-of-process elevated script
    Elevated,
}

/// Result of applying one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum ItemApplyResult {
    Succeeded,
    /// Nothing to write for the requested state
    Skipped(String),
    Failed(String),
    /// Not attempted because the apply was cancelled
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemApplyOutcome {
    pub item_id: String,
    pub result: ItemApplyResult,
    pub method: WriteMethod,
}

impl ItemApplyOutcome {
    fn new(item: &ConfigurationItem, result: ItemApplyResult, method: WriteMethod) -> Self {
        Self {
            item_id: item.id.clone(),
            result,
            method,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == ItemApplyResult::Succeeded
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.result, ItemApplyResult::Failed(_))
    }
}

/// Overall result of applying a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOutcome {
    /// No item failed
    Succeeded,
    /// Some items failed, which the group's policy tolerates
    PartiallySucceeded,
    Failed,
    Cancelled,
}

impl std::fmt::Display for GroupOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GroupOutcome::Succeeded => "succeeded",
            GroupOutcome::PartiallySucceeded => "partially succeeded",
            GroupOutcome::Failed => "failed",
            GroupOutcome::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Per-item outcomes plus the overall verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupApplyReport {
    pub setting_id: String,
    pub enable: bool,
    pub policy: CombinationPolicy,
    pub items: Vec<ItemApplyOutcome>,
    pub outcome: GroupOutcome,
}

impl GroupApplyReport {
    /// Build the report. `strict` groups fail as soon as one item fails;
    /// otherwise any success makes the apply a partial success.
    /// Skipped items count neither way.
    fn new(
        setting_id: &str,
        enable: bool,
        policy: CombinationPolicy,
        strict: bool,
        items: Vec<ItemApplyOutcome>,
    ) -> Self {
        let any_failed = items.iter().any(ItemApplyOutcome::is_failure);
        let any_succeeded = items.iter().any(ItemApplyOutcome::is_success);
        let outcome = if items.iter().any(|i| i.result == ItemApplyResult::Cancelled) {
            GroupOutcome::Cancelled
        } else if !any_failed {
            GroupOutcome::Succeeded
        } else if strict || !any_succeeded {
            GroupOutcome::Failed
        } else {
            GroupOutcome::PartiallySucceeded
        };
        Self {
            setting_id: setting_id.to_string(),
            enable,
            policy,
            items,
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            GroupOutcome::Succeeded | GroupOutcome::PartiallySucceeded
        )
    }

    pub fn failed_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_failure()).count()
    }
}

/// The single registry change an item needs
#[derive(Debug, Clone, PartialEq)]
enum WriteOp {
    SetValue(ConfigPath, ConfigValue),
    DeleteValue(ConfigPath),
    CreateKey(KeyPath),
    DeleteKey(KeyPath),
}

impl std::fmt::Display for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteOp::SetValue(path, _) => write!(f, "write of {}", path),
            WriteOp::DeleteValue(path) => write!(f, "delete of {}", path),
            WriteOp::CreateKey(key) => write!(f, "create of {}", key),
            WriteOp::DeleteKey(key) => write!(f, "delete of {}", key),
        }
    }
}

impl WriteOp {
    fn for_item(item: &ConfigurationItem, enable: bool) -> Option<Self> {
        let path = &item.path;
        let named = path.value_name().is_some();

        let op = match (item.action, enable) {
            (ActionType::Remove, true) => match item.guid_subkey() {
                Some(subkey) => WriteOp::CreateKey(subkey),
                None if named => {
                    let value = item
                        .enable_target()
                        .or(item.default_value.as_ref())
                        .cloned()
                        .unwrap_or_else(|| item.kind.empty_value());
                    WriteOp::SetValue(path.clone(), value)
                }
                None => WriteOp::CreateKey(path.key.clone()),
            },
            (ActionType::Remove, false) => match item.guid_subkey() {
                Some(subkey) => WriteOp::DeleteKey(subkey),
                None if named => WriteOp::DeleteValue(path.clone()),
                None => WriteOp::DeleteKey(path.key.clone()),
            },
            (ActionType::Write, true) if item.is_group_policy => WriteOp::DeleteKey(path.key.clone()),
            (ActionType::Write, false) if item.is_group_policy => {
                match item.disable_target().or(item.enable_target()) {
                    Some(value) if named => WriteOp::SetValue(path.clone(), value.clone()),
                    _ => WriteOp::CreateKey(path.key.clone()),
                }
            }
            (ActionType::Write, true) => match item.enable_target() {
                Some(value) => WriteOp::SetValue(path.clone(), value.clone()),
                None if !named => WriteOp::CreateKey(path.key.clone()),
                None => return None,
            },
            (ActionType::Write, false) => match item.disable_target() {
                Some(value) => WriteOp::SetValue(path.clone(), value.clone()),
                None if named => WriteOp::DeleteValue(path.clone()),
                None => WriteOp::DeleteKey(path.key.clone()),
            },
        };
        Some(op)
    }
}

/// Use case for applying a setting.
///
/// Clears the read cache before and after each setting so later status
/// checks observe fresh state.
pub struct ApplySettingUseCase {
    engine: RegistryEngine,
    verify_writes: bool,
    notifier: Arc<dyn ChangeNotifier>,
    progress: Arc<dyn ApplyProgressNotifier>,
}

impl ApplySettingUseCase {
    pub fn new(engine: RegistryEngine, params: &EngineParams) -> Self {
        Self {
            engine,
            verify_writes: params.verify_writes,
            notifier: Arc::new(NoChangeNotifier),
            progress: Arc::new(NoApplyProgress),
        }
    }

    pub fn with_change_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ApplyProgressNotifier>) -> Self {
        self.progress = progress;
        self
    }

    /// Apply a catalog setting
    pub async fn execute(
        &self,
        setting: &Setting,
        enable: bool,
        cancel: &CancellationToken,
    ) -> GroupApplyReport {
        match setting {
            Setting::Single(item) => {
                let items = std::slice::from_ref(item);
                self.apply_items(&item.id, &item.name, items, CombinationPolicy::All, true, enable, cancel)
                    .await
            }
            Setting::Linked(group) => self.apply_group(group, enable, cancel).await,
        }
    }

    /// Apply every item of a linked group, in order
    pub async fn apply_group(
        &self,
        group: &LinkedConfigurationGroup,
        enable: bool,
        cancel: &CancellationToken,
    ) -> GroupApplyReport {
        let strict = match group.policy {
            CombinationPolicy::All => true,
            CombinationPolicy::Custom => !group.mixes_user_and_machine(),
            CombinationPolicy::Any | CombinationPolicy::Primary => false,
        };
        self.apply_items(&group.id, &group.name, &group.items, group.policy, strict, enable, cancel)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_items(
        &self,
        id: &str,
        name: &str,
        items: &[ConfigurationItem],
        policy: CombinationPolicy,
        strict: bool,
        enable: bool,
        cancel: &CancellationToken,
    ) -> GroupApplyReport {
        info!(
            "Applying {} ({} item(s)) -> {}",
            id,
            items.len(),
            if enable { "enabled" } else { "disabled" }
        );
        self.engine.cache.clear();
        self.progress.on_apply_start(name, items.len(), enable);

        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            if cancel.is_cancelled() {
                outcomes.push(ItemApplyOutcome::new(item, ItemApplyResult::Cancelled, WriteMethod::None));
                continue;
            }
            self.progress.on_item_start(item);
            let outcome = self.apply_item(item, enable).await;
            if let ItemApplyResult::Failed(reason) = &outcome.result {
                warn!("Item {} of {} failed: {}", item.id, id, reason);
            }
            self.progress.on_item_complete(item, &outcome);
            outcomes.push(outcome);
        }

        self.engine.cache.clear();
        let report = GroupApplyReport::new(id, enable, policy, strict, outcomes);
        info!("Apply of {} {}", id, report.outcome);
        self.progress.on_apply_complete(&report);
        report
    }

    /// Apply one item without touching the cache as a whole
    pub async fn apply_item(&self, item: &ConfigurationItem, enable: bool) -> ItemApplyOutcome {
        if !item.is_applicable(enable) {
            return ItemApplyOutcome::new(
                item,
                ItemApplyResult::Skipped("no value to write".to_string()),
                WriteMethod::None,
            );
        }
        let Some(op) = WriteOp::for_item(item, enable) else {
            return ItemApplyOutcome::new(
                item,
                ItemApplyResult::Skipped("no value to write".to_string()),
                WriteMethod::None,
            );
        };
        debug!("{}: {:?}", item.id, op);

        match self.perform(item, &op).await {
            Ok(method) => ItemApplyOutcome::new(item, ItemApplyResult::Succeeded, method),
            Err(reason) => ItemApplyOutcome::new(item, ItemApplyResult::Failed(reason), WriteMethod::None),
        }
    }

    async fn perform(&self, item: &ConfigurationItem, op: &WriteOp) -> Result<WriteMethod, String> {
        // Registry calls block, keep them off the async workers
        let store = self.engine.store.clone();
        let verify = self.verify_writes;
        let direct_op = op.clone();
        let (old, direct) = tokio::task::spawn_blocking(move || write_direct(&store, verify, &direct_op))
            .await
            .map_err(|e| format!("direct write of {} did not complete: {}", op, e))?;

        let method = match direct {
            Ok(()) => WriteMethod::Direct,
            Err(e) if needs_fallback(&e) && !matches!(op, WriteOp::CreateKey(_)) => {
                warn!("Direct {} failed ({}), using elevated fallback", op, e);
                if !self.write_elevated(op).await {
                    return Err(format!("{}; elevated fallback failed", e));
                }
                WriteMethod::Elevated
            }
            Err(e) => return Err(e.to_string()),
        };

        match op {
            WriteOp::SetValue(path, value) => {
                self.publish(ValueChange::new(&item.id, path.clone(), old, Some(value.clone())))
            }
            WriteOp::DeleteValue(path) => self.publish(ValueChange::new(&item.id, path.clone(), old, None)),
            WriteOp::CreateKey(_) | WriteOp::DeleteKey(_) => {}
        }
        Ok(method)
    }

    async fn write_elevated(&self, op: &WriteOp) -> bool {
        let fallback = &self.engine.fallback;
        match op {
            WriteOp::SetValue(path, value) => {
                fallback
                    .set_value_elevated(&path.key, path.value_name().unwrap_or(""), value)
                    .await
            }
            WriteOp::DeleteValue(path) => {
                fallback
                    .delete_value_elevated(&path.key, path.value_name().unwrap_or(""))
                    .await
            }
            WriteOp::DeleteKey(key) => fallback.delete_key_elevated(key).await,
            WriteOp::CreateKey(_) => false,
        }
    }

    fn publish(&self, change: ValueChange) {
        if change.is_noop() {
            debug!("{} unchanged, nothing to publish", change.path);
            return;
        }
        if let Err(e) = self.notifier.publish(&change) {
            warn!("Failed to publish change for {}: {}", change.path, e);
        }
    }
}

/// Direct attempt of one write, re-read unless verification is off.
/// Returns the previous value for value writes.
fn write_direct(
    store: &ValueStore,
    verify: bool,
    op: &WriteOp,
) -> (Option<ConfigValue>, Result<(), RegistryError>) {
    match op {
        WriteOp::SetValue(path, value) => {
            let old = store.get_value(path);
            let result = store
                .try_set_value(path, value)
                .and_then(|()| if verify { verify_set(store, path, value) } else { Ok(()) });
            (old, result)
        }
        WriteOp::DeleteValue(path) => {
            let old = store.get_value(path);
            let result = store
                .try_delete_value(path)
                .and_then(|()| if verify { verify_deleted(store, path) } else { Ok(()) });
            (old, result)
        }
        WriteOp::CreateKey(key) => (None, store.try_create_key(key)),
        WriteOp::DeleteKey(key) => (None, store.try_delete_key(key)),
    }
}

/// Re-read a direct write, bypassing the cache
fn verify_set(store: &ValueStore, path: &ConfigPath, expected: &ConfigValue) -> Result<(), RegistryError> {
    match store.try_get_value(path)? {
        Some(actual) if actual.matches(expected) => Ok(()),
        Some(actual) => Err(RegistryError::VerificationFailed(format!(
            "{} reads back {} instead of {}",
            path, actual, expected
        ))),
        None => Err(RegistryError::VerificationFailed(format!("{} reads back empty", path))),
    }
}

fn verify_deleted(store: &ValueStore, path: &ConfigPath) -> Result<(), RegistryError> {
    match store.try_get_value(path)? {
        None => Ok(()),
        Some(_) => Err(RegistryError::VerificationFailed(format!("{} still present", path))),
    }
}

/// Whether a direct-write error is handed to the privileged fallback
fn needs_fallback(err: &RegistryError) -> bool {
    matches!(
        err,
        RegistryError::AccessDenied(_) | RegistryError::VerificationFailed(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StatusClassifier;
    use crate::ports::change_notifier::NotifyError;
    use crate::ports::command_executor::CommandOutput;
    use crate::ports::registry_backend::{KeyAccess, RegistryBackend, RegistryKey};
    use crate::test_support::{MockExecutor, MockRegistry};
    use regpilot_domain::{Hive, SecurityDescriptor, Sid, Status};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GUID: &str = "{018D5C66-4533-4307-9B53-224DE2ED1FE6}";

    struct Harness {
        registry: MockRegistry,
        executor: Arc<MockExecutor>,
        engine: RegistryEngine,
        use_case: ApplySettingUseCase,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_params(EngineParams::default())
        }

        fn with_params(params: EngineParams) -> Self {
            let registry = MockRegistry::new();
            let executor = Arc::new(MockExecutor::new());
            let engine = RegistryEngine::new(Arc::new(registry.clone()), executor.clone(), &params);
            let use_case = ApplySettingUseCase::new(engine.clone(), &params);
            Self {
                registry,
                executor,
                engine,
                use_case,
            }
        }

        fn classifier(&self) -> &StatusClassifier {
            &self.engine.classifier
        }

        async fn apply(&self, item: &ConfigurationItem, enable: bool) -> GroupApplyReport {
            self.use_case
                .execute(&Setting::Single(item.clone()), enable, &CancellationToken::new())
                .await
        }
    }

    fn key() -> KeyPath {
        KeyPath::new(Hive::CurrentUser, "Software\\X")
    }

    fn toggle() -> ConfigurationItem {
        ConfigurationItem::new("x.y", ConfigPath::new(key(), "Y"))
            .with_enabled_value(1u32)
            .with_disabled_value(0u32)
    }

    #[tokio::test]
    async fn test_enable_then_disable_toggle() {
        let h = Harness::new();

        let report = h.apply(&toggle(), true).await;
        assert_eq!(report.outcome, GroupOutcome::Succeeded);
        assert_eq!(report.items[0].method, WriteMethod::Direct);
        assert_eq!(h.registry.value(&key(), "Y"), Some(ConfigValue::Dword(1)));
        assert_eq!(h.classifier().status(&toggle()), Status::Applied);

        h.apply(&toggle(), false).await;
        assert_eq!(h.registry.value(&key(), "Y"), Some(ConfigValue::Dword(0)));
        assert_eq!(h.classifier().status(&toggle()), Status::NotApplied);
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let h = Harness::new();
        for enable in [true, false] {
            for _ in 0..2 {
                let report = h.apply(&toggle(), enable).await;
                assert_eq!(report.outcome, GroupOutcome::Succeeded);
                assert_eq!(h.classifier().status(&toggle()), Status::expected_after(enable));
            }
        }
    }

    #[tokio::test]
    async fn test_disable_without_target_deletes_value() {
        let h = Harness::new();
        let item = ConfigurationItem::new("x", ConfigPath::new(key(), "Y")).with_enabled_value(1u32);
        h.apply(&item, true).await;
        assert!(h.registry.value(&key(), "Y").is_some());

        let report = h.apply(&item, false).await;
        assert!(report.is_success());
        assert_eq!(h.registry.value(&key(), "Y"), None);
        assert!(h.registry.has_key(&key()));
    }

    #[tokio::test]
    async fn test_enable_without_target_is_skipped() {
        let h = Harness::new();
        let item = ConfigurationItem::new("x", ConfigPath::new(key(), "Y")).with_disabled_value(0u32);
        let report = h.apply(&item, true).await;
        assert!(matches!(report.items[0].result, ItemApplyResult::Skipped(_)));
        assert_eq!(report.outcome, GroupOutcome::Succeeded);
        assert!(!h.registry.has_key(&key()));
    }

    #[tokio::test]
    async fn test_remove_item_with_guid_name() {
        let h = Harness::new();
        let item = ConfigurationItem::new("ns", ConfigPath::new(key(), GUID)).with_action(ActionType::Remove);
        let subkey = key().child(GUID);

        h.apply(&item, true).await;
        assert!(h.registry.has_key(&subkey));
        assert_eq!(h.classifier().status(&item), Status::NotApplied);

        h.apply(&item, false).await;
        assert!(!h.registry.has_key(&subkey));
        assert!(h.registry.has_key(&key()));
        assert_eq!(h.classifier().status(&item), Status::Applied);
    }

    #[tokio::test]
    async fn test_remove_item_with_value_name() {
        let h = Harness::new();
        let item = ConfigurationItem::new("r", ConfigPath::new(key(), "Y"))
            .with_kind(regpilot_domain::ValueKind::String)
            .with_action(ActionType::Remove);

        h.apply(&item, true).await;
        assert_eq!(h.registry.value(&key(), "Y"), Some(ConfigValue::String(String::new())));
        h.apply(&item, false).await;
        assert_eq!(h.registry.value(&key(), "Y"), None);
    }

    #[tokio::test]
    async fn test_group_policy_item() {
        let h = Harness::new();
        let policy_key = KeyPath::new(Hive::LocalMachine, "SOFTWARE\\Policies\\Vendor\\Feature");
        let item = ConfigurationItem::new("gp", ConfigPath::new(policy_key.clone(), "Disable"))
            .with_disabled_value(1u32)
            .group_policy()
            .absence_means_enabled();

        h.apply(&item, false).await;
        assert_eq!(h.registry.value(&policy_key, "Disable"), Some(ConfigValue::Dword(1)));

        h.apply(&item, true).await;
        assert!(!h.registry.has_key(&policy_key));
        assert_eq!(h.classifier().status(&item), Status::Applied);
    }

    #[tokio::test]
    async fn test_denied_key_takes_ownership_once() {
        let h = Harness::new();
        h.registry.lock_key(&key());

        let report = h.apply(&toggle(), true).await;
        assert_eq!(report.items[0].method, WriteMethod::Direct);
        assert_eq!(h.engine.store.accessor().escalator().attempts(), 1);
        assert_eq!(h.engine.fallback.invocations(), 0);
        assert_eq!(h.registry.value(&key(), "Y"), Some(ConfigValue::Dword(1)));
    }

    #[tokio::test]
    async fn test_failed_takeover_falls_back_once() {
        let h = Harness::new();
        h.registry.lock_key(&key());
        h.registry.fail_security_writes();

        let report = h.apply(&toggle(), true).await;
        assert_eq!(report.outcome, GroupOutcome::Succeeded);
        assert_eq!(report.items[0].method, WriteMethod::Elevated);
        assert_eq!(h.engine.store.accessor().escalator().attempts(), 1);
        assert_eq!(h.engine.fallback.invocations(), 1);
        assert_eq!(h.executor.elevated_calls(), 1);
    }

    #[tokio::test]
    async fn test_write_that_does_not_stick_falls_back() {
        let h = Harness::new();
        h.registry.seed_key(&key());
        h.registry.swallow_writes(&key());

        let report = h.apply(&toggle(), true).await;
        assert_eq!(report.items[0].method, WriteMethod::Elevated);
        assert_eq!(h.engine.fallback.invocations(), 1);
    }

    #[tokio::test]
    async fn test_no_verification_when_disabled() {
        let h = Harness::with_params(EngineParams::default().with_verify_writes(false));
        h.registry.seed_key(&key());
        h.registry.swallow_writes(&key());

        let report = h.apply(&toggle(), true).await;
        assert_eq!(report.items[0].method, WriteMethod::Direct);
        assert_eq!(h.engine.fallback.invocations(), 0);
    }

    #[tokio::test]
    async fn test_failed_fallback_fails_item() {
        let h = Harness::new();
        h.registry.seed_key(&key());
        h.registry.protect_key(&key());
        h.executor.push_elevated(Ok(CommandOutput::failure(1, "denied")));

        let report = h.apply(&toggle(), true).await;
        assert_eq!(report.outcome, GroupOutcome::Failed);
        assert!(report.items[0].is_failure());
        assert_eq!(h.engine.fallback.invocations(), 1);
    }

    fn mixed_group(policy: CombinationPolicy) -> LinkedConfigurationGroup {
        let machine = KeyPath::new(Hive::LocalMachine, "SOFTWARE\\X");
        LinkedConfigurationGroup::new(
            "mixed",
            vec![
                ConfigurationItem::new("machine", ConfigPath::new(machine, "Y")).with_enabled_value(1u32),
                toggle(),
            ],
            policy,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_failed_item_does_not_stop_siblings() {
        let h = Harness::with_params(EngineParams::default().with_elevation(false));
        let machine = KeyPath::new(Hive::LocalMachine, "SOFTWARE\\X");
        h.registry.seed_key(&machine);
        h.registry.protect_key(&machine);

        let report = h
            .use_case
            .apply_group(&mixed_group(CombinationPolicy::Any), true, &CancellationToken::new())
            .await;
        assert!(report.items[0].is_failure());
        assert!(report.items[1].is_success());
        assert_eq!(report.outcome, GroupOutcome::PartiallySucceeded);
        assert_eq!(h.registry.value(&key(), "Y"), Some(ConfigValue::Dword(1)));

        let report = h
            .use_case
            .apply_group(&mixed_group(CombinationPolicy::All), true, &CancellationToken::new())
            .await;
        assert_eq!(report.outcome, GroupOutcome::Failed);
        assert!(!report.is_success());
        assert_eq!(report.failed_count(), 1);

        // Custom over mixed hives behaves like Any
        let report = h
            .use_case
            .apply_group(&mixed_group(CombinationPolicy::Custom), true, &CancellationToken::new())
            .await;
        assert_eq!(report.outcome, GroupOutcome::PartiallySucceeded);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let h = Harness::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = h
            .use_case
            .apply_group(&mixed_group(CombinationPolicy::All), true, &cancel)
            .await;
        assert_eq!(report.outcome, GroupOutcome::Cancelled);
        assert!(report.items.iter().all(|i| i.result == ItemApplyResult::Cancelled));
        assert!(!h.registry.has_key(&key()));
    }

    #[tokio::test]
    async fn test_status_after_apply_sees_fresh_state() {
        let h = Harness::new();
        assert_eq!(h.classifier().status(&toggle()), Status::NotApplied);
        h.apply(&toggle(), true).await;
        assert_eq!(h.classifier().status(&toggle()), Status::Applied);
    }

    #[derive(Default)]
    struct RecordingNotifier {
        changes: Mutex<Vec<ValueChange>>,
        fail: bool,
    }

    impl ChangeNotifier for RecordingNotifier {
        fn publish(&self, change: &ValueChange) -> Result<(), NotifyError> {
            self.changes.lock().unwrap().push(change.clone());
            if self.fail {
                return Err(NotifyError::Closed);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_changes_are_published() {
        let notifier = Arc::new(RecordingNotifier::default());
        let h = Harness::new();
        let use_case = ApplySettingUseCase::new(h.engine.clone(), &EngineParams::default())
            .with_change_notifier(notifier.clone());
        let cancel = CancellationToken::new();
        let setting = Setting::Single(toggle());

        use_case.execute(&setting, true, &cancel).await;
        use_case.execute(&setting, true, &cancel).await;
        use_case.execute(&setting, false, &cancel).await;

        let changes = notifier.changes.lock().unwrap();
        // The repeated enable is a no-op and is not published
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].item_id, "x.y");
        assert_eq!(changes[0].old_value, None);
        assert_eq!(changes[0].new_value, Some(ConfigValue::Dword(1)));
        assert_eq!(changes[1].old_value, Some(ConfigValue::Dword(1)));
        assert_eq!(changes[1].new_value, Some(ConfigValue::Dword(0)));
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_write() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let h = Harness::new();
        let use_case = ApplySettingUseCase::new(h.engine.clone(), &EngineParams::default())
            .with_change_notifier(notifier);

        let report = use_case
            .execute(&Setting::Single(toggle()), true, &CancellationToken::new())
            .await;
        assert_eq!(report.outcome, GroupOutcome::Succeeded);
    }

    #[derive(Default)]
    struct CountingProgress {
        started: AtomicUsize,
        completed: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ApplyProgressNotifier for CountingProgress {
        fn on_item_start(&self, _item: &ConfigurationItem) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_complete(&self, _item: &ConfigurationItem, _outcome: &ItemApplyOutcome) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_apply_complete(&self, _report: &GroupApplyReport) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_progress_is_reported_per_item() {
        let progress = Arc::new(CountingProgress::default());
        let h = Harness::new();
        let use_case = ApplySettingUseCase::new(h.engine.clone(), &EngineParams::default())
            .with_progress(progress.clone());

        use_case
            .apply_group(&mixed_group(CombinationPolicy::All), true, &CancellationToken::new())
            .await;
        assert_eq!(progress.started.load(Ordering::SeqCst), 2);
        assert_eq!(progress.completed.load(Ordering::SeqCst), 2);
        assert_eq!(progress.finished.load(Ordering::SeqCst), 1);
    }

    /// Records which threads open keys for writing
    struct ThreadTrackingRegistry {
        inner: MockRegistry,
        writers: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl RegistryBackend for ThreadTrackingRegistry {
        fn open_key(&self, key: &KeyPath, access: KeyAccess) -> Result<Box<dyn RegistryKey>, RegistryError> {
            if access == KeyAccess::ReadWrite {
                self.writers.lock().unwrap().push(std::thread::current().id());
            }
            self.inner.open_key(key, access)
        }

        fn create_subkey(
            &self,
            parent: &KeyPath,
            name: &str,
            security: Option<&SecurityDescriptor>,
        ) -> Result<(), RegistryError> {
            self.inner.create_subkey(parent, name, security)
        }

        fn delete_key_tree(&self, key: &KeyPath) -> Result<(), RegistryError> {
            self.inner.delete_key_tree(key)
        }

        fn read_security(&self, key: &KeyPath) -> Result<SecurityDescriptor, RegistryError> {
            self.inner.read_security(key)
        }

        fn write_security(&self, key: &KeyPath, descriptor: &SecurityDescriptor) -> Result<(), RegistryError> {
            self.inner.write_security(key, descriptor)
        }

        fn current_user_sid(&self) -> Result<Sid, RegistryError> {
            self.inner.current_user_sid()
        }
    }

    #[tokio::test]
    async fn test_direct_writes_run_on_blocking_pool() {
        let registry = Arc::new(ThreadTrackingRegistry {
            inner: MockRegistry::new(),
            writers: Mutex::new(Vec::new()),
        });
        let params = EngineParams::default();
        let engine = RegistryEngine::new(registry.clone(), Arc::new(MockExecutor::new()), &params);
        let use_case = ApplySettingUseCase::new(engine, &params);

        let report = use_case
            .execute(&Setting::Single(toggle()), true, &CancellationToken::new())
            .await;
        assert_eq!(report.outcome, GroupOutcome::Succeeded);
        assert_eq!(registry.inner.value(&key(), "Y"), Some(ConfigValue::Dword(1)));

        let runtime_thread = std::thread::current().id();
        let writers = registry.writers.lock().unwrap();
        assert!(!writers.is_empty());
        assert!(writers.iter().all(|id| *id != runtime_thread));
    }
}
