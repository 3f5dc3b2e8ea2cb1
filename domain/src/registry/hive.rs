//! Registry hives
//!
//! The fixed set of top-level roots a [`KeyPath`](super::path::KeyPath) can
//! start from.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// A top-level registry root
///
/// Parsing is case-insensitive and accepts both the short (`HKCU`) and the
/// long (`HKEY_CURRENT_USER`) spelling:
///
/// ```
/// use regpilot_domain::registry::Hive;
///
/// assert_eq!("hkcu".parse::<Hive>().ok(), Some(Hive::CurrentUser));
/// assert_eq!("HKEY_LOCAL_MACHINE".parse::<Hive>().ok(), Some(Hive::LocalMachine));
/// assert!("HKXX".parse::<Hive>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Hive {
    LocalMachine,
    CurrentUser,
    ClassesRoot,
    Users,
    CurrentConfig,
}

impl Hive {
    /// All hives, in a stable order
    pub const ALL: [Hive; 5] = [
        Hive::LocalMachine,
        Hive::CurrentUser,
        Hive::ClassesRoot,
        Hive::Users,
        Hive::CurrentConfig,
    ];

    /// Short token, e.g. `HKLM`
    pub fn short_name(&self) -> &'static str {
        match self {
            Hive::LocalMachine => "HKLM",
            Hive::CurrentUser => "HKCU",
            Hive::ClassesRoot => "HKCR",
            Hive::Users => "HKU",
            Hive::CurrentConfig => "HKCC",
        }
    }

    /// Long token, e.g. `HKEY_LOCAL_MACHINE`
    pub fn long_name(&self) -> &'static str {
        match self {
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
            Hive::CurrentUser => "HKEY_CURRENT_USER",
            Hive::ClassesRoot => "HKEY_CLASSES_ROOT",
            Hive::Users => "HKEY_USERS",
            Hive::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }

    /// PowerShell provider drive for this hive.
    ///
    /// Only HKLM and HKCU have drives by default; the others go through the
    /// `Registry::` provider prefix.
    pub fn powershell_root(&self) -> String {
        match self {
            Hive::LocalMachine => "HKLM:".to_string(),
            Hive::CurrentUser => "HKCU:".to_string(),
            other => format!("Registry::{}", other.long_name()),
        }
    }
}

impl std::fmt::Display for Hive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

impl std::str::FromStr for Hive {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HKLM" | "HKEY_LOCAL_MACHINE" => Ok(Hive::LocalMachine),
            "HKCU" | "HKEY_CURRENT_USER" => Ok(Hive::CurrentUser),
            "HKCR" | "HKEY_CLASSES_ROOT" => Ok(Hive::ClassesRoot),
            "HKU" | "HKEY_USERS" => Ok(Hive::Users),
            "HKCC" | "HKEY_CURRENT_CONFIG" => Ok(Hive::CurrentConfig),
            _ => Err(DomainError::InvalidHive(s.to_string())),
        }
    }
}

impl TryFrom<String> for Hive {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Hive> for String {
    fn from(hive: Hive) -> Self {
        hive.short_name().to_string()
    }
}
