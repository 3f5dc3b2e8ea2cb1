//! Configuration items and linked groups
//!
//! These are the value objects supplied by the settings catalog. The engine
//! only ever reads them.

use crate::core::error::DomainError;
use crate::registry::{ConfigPath, ConfigValue, Hive, KeyPath, ValueKind};
use serde::{Deserialize, Serialize};

/// What an item wants done to its key/value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// The item is satisfied by a specific value being present
    #[default]
    Write,
    /// The item is satisfied by the key or value being absent
    Remove,
}

/// Rule for deriving one status from the statuses of a linked group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CombinationPolicy {
    /// Every item must agree
    #[default]
    All,
    /// One applied item is enough
    Any,
    /// The item flagged primary decides
    Primary,
    /// `Any` for groups mixing CurrentUser and LocalMachine, otherwise `All`
    Custom,
}

impl std::fmt::Display for CombinationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CombinationPolicy::All => "all",
            CombinationPolicy::Any => "any",
            CombinationPolicy::Primary => "primary",
            CombinationPolicy::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// One logical setting backed by a single key/value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationItem {
    pub id: String,
    pub name: String,
    pub path: ConfigPath,
    #[serde(default)]
    pub kind: ValueKind,
    /// Written when enabling; falls back to `recommended_value`
    pub enabled_value: Option<ConfigValue>,
    pub recommended_value: Option<ConfigValue>,
    /// Written when disabling; falls back to `default_value`
    pub disabled_value: Option<ConfigValue>,
    pub default_value: Option<ConfigValue>,
    #[serde(default)]
    pub action: ActionType,
    #[serde(default)]
    pub absence_means_enabled: bool,
    /// Only meaningful inside a linked group
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub is_group_policy: bool,
}

impl ConfigurationItem {
    pub fn new(id: impl Into<String>, path: ConfigPath) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            path,
            kind: ValueKind::default(),
            enabled_value: None,
            recommended_value: None,
            disabled_value: None,
            default_value: None,
            action: ActionType::Write,
            absence_means_enabled: false,
            is_primary: false,
            is_group_policy: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_enabled_value(mut self, value: impl Into<ConfigValue>) -> Self {
        let value = value.into();
        self.kind = value.kind();
        self.enabled_value = Some(value);
        self
    }

    pub fn with_recommended_value(mut self, value: impl Into<ConfigValue>) -> Self {
        self.recommended_value = Some(value.into());
        self
    }

    pub fn with_disabled_value(mut self, value: impl Into<ConfigValue>) -> Self {
        self.disabled_value = Some(value.into());
        self
    }

    pub fn with_default_value(mut self, value: impl Into<ConfigValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_action(mut self, action: ActionType) -> Self {
        self.action = action;
        self
    }

    pub fn absence_means_enabled(mut self) -> Self {
        self.absence_means_enabled = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn group_policy(mut self) -> Self {
        self.is_group_policy = true;
        self
    }

    pub fn key(&self) -> &KeyPath {
        &self.path.key
    }

    pub fn hive(&self) -> Hive {
        self.path.hive()
    }

    pub fn value_name(&self) -> Option<&str> {
        self.path.value_name()
    }

    /// Value written when enabling
    pub fn enable_target(&self) -> Option<&ConfigValue> {
        self.enabled_value.as_ref().or(self.recommended_value.as_ref())
    }

    /// Value written when disabling
    pub fn disable_target(&self) -> Option<&ConfigValue> {
        self.disabled_value.as_ref().or(self.default_value.as_ref())
    }

    /// Whether applying `enable` has anything to write.
    ///
    /// Enabling a Write item that names a value needs an enable target;
    /// key-only items are satisfied by creating the key.
    pub fn is_applicable(&self, enable: bool) -> bool {
        match self.action {
            ActionType::Remove => true,
            ActionType::Write if self.is_group_policy => true,
            ActionType::Write if enable => {
                self.enable_target().is_some() || self.value_name().is_none()
            }
            ActionType::Write => true,
        }
    }

    /// The value name, when it parses as a GUID (braces optional)
    pub fn guid_name(&self) -> Option<&str> {
        let name = self.value_name()?;
        let bare = name.trim().trim_start_matches('{').trim_end_matches('}');
        uuid::Uuid::parse_str(bare).ok().map(|_| name)
    }

    /// Key named by the GUID value name, for Remove-type items that track
    /// a GUID subkey instead of a value
    pub fn guid_subkey(&self) -> Option<KeyPath> {
        self.guid_name().map(|name| self.path.key.child(name))
    }
}

/// Several items presented as one toggle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedConfigurationGroup {
    pub id: String,
    pub name: String,
    pub items: Vec<ConfigurationItem>,
    #[serde(default)]
    pub policy: CombinationPolicy,
}

impl LinkedConfigurationGroup {
    pub fn new(
        id: impl Into<String>,
        items: Vec<ConfigurationItem>,
        policy: CombinationPolicy,
    ) -> Result<Self, DomainError> {
        let id = id.into();
        if items.is_empty() {
            return Err(DomainError::EmptyGroup(id));
        }
        Ok(Self {
            name: id.clone(),
            id,
            items,
            policy,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Index of the first item flagged primary, or 0
    pub fn primary_index(&self) -> usize {
        self.items.iter().position(|i| i.is_primary).unwrap_or(0)
    }

    /// True when items are rooted at both CurrentUser and LocalMachine
    pub fn mixes_user_and_machine(&self) -> bool {
        let user = self.items.iter().any(|i| i.hive() == Hive::CurrentUser);
        let machine = self.items.iter().any(|i| i.hive() == Hive::LocalMachine);
        user && machine
    }
}

/// A catalog entry: either one item or a linked group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Setting {
    Single(ConfigurationItem),
    Linked(LinkedConfigurationGroup),
}

impl Setting {
    pub fn id(&self) -> &str {
        match self {
            Setting::Single(item) => &item.id,
            Setting::Linked(group) => &group.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Setting::Single(item) => &item.name,
            Setting::Linked(group) => &group.name,
        }
    }

    /// Items in apply order
    pub fn items(&self) -> &[ConfigurationItem] {
        match self {
            Setting::Single(item) => std::slice::from_ref(item),
            Setting::Linked(group) => &group.items,
        }
    }
}
