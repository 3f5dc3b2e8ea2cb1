//! TOML catalog loader

use regpilot_domain::{
    ActionType, CombinationPolicy, ConfigPath, ConfigValue, ConfigurationItem, DomainError,
    KeyPath, LinkedConfigurationGroup, PowerPlan, PowerPlanCatalog, Setting, ValueKind,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const BUILTIN_CATALOG: &str = include_str!("../../catalog/default.toml");

/// Errors that can occur while loading a catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid catalog: {0}")]
    Parse(String),

    #[error("Invalid entry '{id}': {source}")]
    InvalidEntry {
        id: String,
        #[source]
        source: DomainError,
    },

    #[error("Duplicate setting id: {0}")]
    DuplicateId(String),
}

impl CatalogError {
    fn entry(id: &str) -> impl FnOnce(DomainError) -> CatalogError + '_ {
        move |source| CatalogError::InvalidEntry {
            id: id.to_string(),
            source,
        }
    }
}

/// One item as written in the file. Values are loosely typed and converted
/// through the item's `kind`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawItem {
    id: String,
    name: Option<String>,
    path: String,
    /// Omitted for key-level items; `""` is the default value
    value: Option<String>,
    kind: Option<String>,
    enabled: Option<serde_json::Value>,
    recommended: Option<serde_json::Value>,
    disabled: Option<serde_json::Value>,
    default: Option<serde_json::Value>,
    #[serde(default)]
    action: ActionType,
    absence_means_enabled: Option<bool>,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    group_policy: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    id: String,
    name: Option<String>,
    #[serde(default)]
    policy: CombinationPolicy,
    #[serde(default, rename = "item")]
    items: Vec<RawItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
    #[serde(default, rename = "setting")]
    settings: Vec<RawItem>,
    #[serde(default, rename = "group")]
    groups: Vec<RawGroup>,
    #[serde(default, rename = "power_plan")]
    power_plans: Vec<PowerPlan>,
}

impl RawItem {
    fn into_item(self) -> Result<ConfigurationItem, CatalogError> {
        let key = KeyPath::parse(&self.path).map_err(CatalogError::entry(&self.id))?;
        let path = match self.value {
            Some(name) => ConfigPath::new(key, name),
            None => ConfigPath::key_only(key),
        };
        let kind: ValueKind = match &self.kind {
            Some(kind) => kind.parse().map_err(CatalogError::entry(&self.id))?,
            None => ValueKind::default(),
        };
        let convert = |value: &Option<serde_json::Value>| -> Result<Option<ConfigValue>, CatalogError> {
            value
                .as_ref()
                .map(|json| kind.value_from_json(json))
                .transpose()
                .map_err(CatalogError::entry(&self.id))
        };

        let mut item = ConfigurationItem::new(&self.id, path)
            .with_name(self.name.clone().unwrap_or_else(|| self.id.clone()))
            .with_kind(kind)
            .with_action(self.action);
        item.enabled_value = convert(&self.enabled)?;
        item.recommended_value = convert(&self.recommended)?;
        item.disabled_value = convert(&self.disabled)?;
        item.default_value = convert(&self.default)?;
        item.is_primary = self.primary;
        item.is_group_policy = self.group_policy;
        // A deleted policy key is the enabled state of a group-policy item
        item.absence_means_enabled = self.absence_means_enabled.unwrap_or(self.group_policy);
        Ok(item)
    }
}

/// Settings and power plans loaded from a TOML catalog
#[derive(Debug, Clone)]
pub struct TomlCatalog {
    settings: Vec<Setting>,
    power_plans: PowerPlanCatalog,
}

impl TomlCatalog {
    /// Load a catalog file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let catalog = Self::parse(&content)?;
        debug!("Loaded {} settings from {}", catalog.settings.len(), path.display());
        Ok(catalog)
    }

    /// The catalog bundled with the binary
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::parse(BUILTIN_CATALOG)
    }

    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = toml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut settings = Vec::with_capacity(raw.settings.len() + raw.groups.len());
        for item in raw.settings {
            settings.push(Setting::Single(item.into_item()?));
        }
        for group in raw.groups {
            let items = group
                .items
                .into_iter()
                .map(RawItem::into_item)
                .collect::<Result<Vec<_>, _>>()?;
            let linked = LinkedConfigurationGroup::new(&group.id, items, group.policy)
                .map_err(CatalogError::entry(&group.id))?
                .with_name(group.name.unwrap_or_else(|| group.id.clone()));
            settings.push(Setting::Linked(linked));
        }

        let mut seen = HashSet::new();
        for setting in &settings {
            if !seen.insert(setting.id().to_lowercase()) {
                return Err(CatalogError::DuplicateId(setting.id().to_string()));
            }
        }

        let mut power_plans = PowerPlanCatalog::well_known();
        for plan in raw.power_plans {
            power_plans.insert(plan);
        }

        Ok(Self {
            settings,
            power_plans,
        })
    }

    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }

    /// Case-insensitive lookup by setting id
    pub fn get(&self, id: &str) -> Option<&Setting> {
        self.settings.iter().find(|s| s.id().eq_ignore_ascii_case(id))
    }

    pub fn power_plans(&self) -> &PowerPlanCatalog {
        &self.power_plans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regpilot_domain::Hive;

    const SAMPLE: &str = r#"
[[setting]]
id = "file_extensions"
name = "Show file extensions"
path = 'HKCU\Software\Microsoft\Windows\CurrentVersion\Explorer\Advanced'
value = "HideFileExt"
enabled = 0
disabled = 1

[[setting]]
id = "web_search"
path = 'HKLM\SOFTWARE\Policies\Microsoft\Windows\Windows Search'
value = "DisableWebSearch"
disabled = 1
group_policy = true

[[group]]
id = "telemetry"
policy = "custom"

[[group.item]]
id = "telemetry_policy"
path = 'HKLM\SOFTWARE\Policies\Microsoft\Windows\DataCollection'
value = "AllowTelemetry"
enabled = "0x0"
primary = true

[[group.item]]
id = "tailored"
path = 'HKCU\Software\Microsoft\Windows\CurrentVersion\Privacy'
value = "TailoredExperiencesWithDiagnosticDataEnabled"
kind = "REG_DWORD"
enabled = false
disabled = true

[[power_plan]]
name = "Gaming"
guid = "11111111-2222-3333-4444-555555555555"
"#;

    #[test]
    fn test_parse_sample() {
        let catalog = TomlCatalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.settings().len(), 3);

        let Some(Setting::Single(ext)) = catalog.get("FILE_EXTENSIONS") else {
            panic!("file_extensions missing");
        };
        assert_eq!(ext.name, "Show file extensions");
        assert_eq!(ext.path.hive(), Hive::CurrentUser);
        assert_eq!(ext.enabled_value, Some(ConfigValue::Dword(0)));
        assert_eq!(ext.disabled_value, Some(ConfigValue::Dword(1)));
        assert!(!ext.absence_means_enabled);

        let Some(Setting::Single(web)) = catalog.get("web_search") else {
            panic!("web_search missing");
        };
        assert!(web.is_group_policy);
        assert!(web.absence_means_enabled);

        let Some(Setting::Linked(group)) = catalog.get("telemetry") else {
            panic!("telemetry missing");
        };
        assert_eq!(group.policy, CombinationPolicy::Custom);
        assert_eq!(group.primary_index(), 0);
        assert_eq!(group.items[0].enabled_value, Some(ConfigValue::Dword(0)));
        assert_eq!(group.items[1].disabled_value, Some(ConfigValue::Dword(1)));

        assert!(catalog.power_plans().get("gaming").is_some());
        assert!(catalog.power_plans().get("Balanced").is_some());
    }

    #[test]
    fn test_key_only_and_remove_items() {
        let catalog = TomlCatalog::parse(
            r#"
[[setting]]
id = "home_namespace"
path = 'HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Explorer\Desktop\NameSpace'
value = "{f874310e-b6b7-47dc-bc84-b9e6b38f5903}"
action = "remove"

[[setting]]
id = "marker"
path = 'HKCU\Software\Vendor\Marker'
"#,
        )
        .unwrap();

        let remove = &catalog.settings()[0].items()[0];
        assert_eq!(remove.action, ActionType::Remove);
        assert!(remove.guid_subkey().is_some());

        let marker = &catalog.settings()[1].items()[0];
        assert_eq!(marker.value_name(), None);
    }

    #[test]
    fn test_invalid_entries() {
        let bad_hive = "[[setting]]\nid = \"x\"\npath = 'HKXX\\Nope'\n";
        assert!(matches!(
            TomlCatalog::parse(bad_hive),
            Err(CatalogError::InvalidEntry { ref id, .. }) if id == "x"
        ));

        let bad_value = "[[setting]]\nid = \"x\"\npath = 'HKCU\\A'\nvalue = \"V\"\nenabled = \"abc\"\n";
        assert!(matches!(TomlCatalog::parse(bad_value), Err(CatalogError::InvalidEntry { .. })));

        let bad_binary = "[[setting]]\nid = \"x\"\npath = 'HKCU\\A'\nvalue = \"V\"\nkind = \"binary\"\nenabled = \"aéb\"\n";
        assert!(matches!(
            TomlCatalog::parse(bad_binary),
            Err(CatalogError::InvalidEntry { ref id, .. }) if id == "x"
        ));

        let empty_group = "[[group]]\nid = \"g\"\n";
        assert!(matches!(TomlCatalog::parse(empty_group), Err(CatalogError::InvalidEntry { .. })));

        let duplicate = "[[setting]]\nid = \"x\"\npath = 'HKCU\\A'\n[[setting]]\nid = \"X\"\npath = 'HKCU\\B'\n";
        assert!(matches!(TomlCatalog::parse(duplicate), Err(CatalogError::DuplicateId(_))));

        assert!(matches!(TomlCatalog::parse("[[setting]]\nid = 1"), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(TomlCatalog::load(&path).unwrap().settings().len(), 3);

        assert!(matches!(
            TomlCatalog::load(dir.path().join("missing.toml")),
            Err(CatalogError::Io { .. })
        ));
    }

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = TomlCatalog::builtin().unwrap();
        assert!(!catalog.settings().is_empty());
        assert!(catalog.settings().iter().any(|s| matches!(s, Setting::Linked(_))));
    }
}
