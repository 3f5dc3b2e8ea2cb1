//! Registry key and value paths

use super::hive::Hive;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Subkey prefix under which Group Policy stores its settings
const POLICY_PREFIX: [&str; 2] = ["software", "policies"];

/// A registry key: hive plus backslash-delimited subkey
///
/// Segments are opaque; forward slashes are accepted on input and normalized
/// to backslashes, and empty segments are dropped.
///
/// ```
/// use regpilot_domain::registry::{Hive, KeyPath};
///
/// let key = KeyPath::parse("HKEY_CURRENT_USER/Software//Vendor\\App").unwrap();
/// assert_eq!(key.hive(), Hive::CurrentUser);
/// assert_eq!(key.sub_key(), "Software\\Vendor\\App");
/// assert_eq!(key.to_string(), "HKCU\\Software\\Vendor\\App");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyPath {
    hive: Hive,
    sub_key: String,
}

impl KeyPath {
    /// Create a key path from a hive and a raw subkey string
    pub fn new(hive: Hive, sub_key: &str) -> Self {
        Self {
            hive,
            sub_key: normalize(sub_key),
        }
    }

    /// The root of a hive
    pub fn root(hive: Hive) -> Self {
        Self {
            hive,
            sub_key: String::new(),
        }
    }

    /// Parse `HIVE\Sub\Path`. The hive token may carry a trailing `:`
    /// (PowerShell drive form).
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidPath(input.to_string()));
        }

        let (hive_token, rest) = match trimmed.find(['\\', '/']) {
            Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
            None => (trimmed, ""),
        };
        let hive: Hive = hive_token.trim_end_matches(':').parse()?;
        Ok(Self::new(hive, rest))
    }

    pub fn hive(&self) -> Hive {
        self.hive
    }

    /// Subkey relative to the hive root, backslash-delimited
    pub fn sub_key(&self) -> &str {
        &self.sub_key
    }

    pub fn is_root(&self) -> bool {
        self.sub_key.is_empty()
    }

    /// Subkey segments from the hive root downward
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.sub_key.split('\\').filter(|s| !s.is_empty())
    }

    /// Last segment, or `None` for a hive root
    pub fn name(&self) -> Option<&str> {
        self.segments().last()
    }

    pub fn parent(&self) -> Option<KeyPath> {
        if self.is_root() {
            return None;
        }
        let parent = match self.sub_key.rfind('\\') {
            Some(idx) => &self.sub_key[..idx],
            None => "",
        };
        Some(Self {
            hive: self.hive,
            sub_key: parent.to_string(),
        })
    }

    pub fn child(&self, name: &str) -> KeyPath {
        if self.is_root() {
            Self::new(self.hive, name)
        } else {
            Self::new(self.hive, &format!("{}\\{}", self.sub_key, name))
        }
    }

    /// Every non-root prefix of this path, shallowest first
    ///
    /// `HKCU\A\B` yields `HKCU\A`, `HKCU\A\B`.
    pub fn prefixes(&self) -> Vec<KeyPath> {
        let mut out = Vec::new();
        let mut current = KeyPath::root(self.hive);
        for segment in self.segments() {
            current = current.child(segment);
            out.push(current.clone());
        }
        out
    }

    /// True when `other` is this key or lies below it (case-insensitive)
    pub fn contains(&self, other: &KeyPath) -> bool {
        if self.hive != other.hive {
            return false;
        }
        if self.is_root() {
            return true;
        }
        let mine = self.sub_key.to_lowercase();
        let theirs = other.sub_key.to_lowercase();
        theirs == mine || theirs.starts_with(&format!("{}\\", mine))
    }

    /// True for keys under `Software\Policies`
    pub fn is_policy_path(&self) -> bool {
        let lowered: Vec<String> = self.segments().take(2).map(str::to_lowercase).collect();
        lowered.len() == 2 && lowered[0] == POLICY_PREFIX[0] && lowered[1] == POLICY_PREFIX[1]
    }

    /// Lowercased full path, used as a cache key
    pub fn cache_key(&self) -> String {
        self.to_string().to_lowercase()
    }

    /// `HKEY_CURRENT_USER\Software\X`, as expected by `reg.exe`
    pub fn long_form(&self) -> String {
        if self.is_root() {
            self.hive.long_name().to_string()
        } else {
            format!("{}\\{}", self.hive.long_name(), self.sub_key)
        }
    }

    /// `HKCU:\Software\X`, as expected by the PowerShell registry provider
    pub fn powershell_path(&self) -> String {
        format!("{}\\{}", self.hive.powershell_root(), self.sub_key)
    }
}

fn normalize(raw: &str) -> String {
    raw.split(['\\', '/'])
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\\")
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            write!(f, "{}", self.hive)
        } else {
            write!(f, "{}\\{}", self.hive, self.sub_key)
        }
    }
}

impl std::str::FromStr for KeyPath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for KeyPath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<KeyPath> for String {
    fn from(path: KeyPath) -> Self {
        path.to_string()
    }
}

/// A key plus an optional value name
///
/// A `None` value name addresses the key itself (key-level items such as
/// "this key must not exist").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigPath {
    pub key: KeyPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
}

impl ConfigPath {
    pub fn new(key: KeyPath, value_name: impl Into<String>) -> Self {
        Self {
            key,
            value_name: Some(value_name.into()),
        }
    }

    pub fn key_only(key: KeyPath) -> Self {
        Self {
            key,
            value_name: None,
        }
    }

    pub fn hive(&self) -> Hive {
        self.key.hive()
    }

    /// Value name, with an empty name standing for the key's default value
    pub fn value_name(&self) -> Option<&str> {
        self.value_name.as_deref()
    }

    /// Lowercased `key::value` used as a cache key
    pub fn cache_key(&self) -> String {
        match &self.value_name {
            Some(name) => format!("{}::{}", self.key.cache_key(), name.to_lowercase()),
            None => self.key.cache_key(),
        }
    }
}

impl std::fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value_name {
            Some(name) => write!(f, "{} [{}]", self.key, name),
            None => write!(f, "{}", self.key),
        }
    }
}
