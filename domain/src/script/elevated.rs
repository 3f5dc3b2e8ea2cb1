//! PowerShell scripts run by the privileged write fallback
//!
//! Each script is self-verifying: it exits non-zero (via `throw` under
//! `$ErrorActionPreference = 'Stop'`) when the registry does not end up in
//! the requested state.

use crate::registry::value::quote_single;
use crate::registry::{ConfigValue, KeyPath};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// PowerShell's name for a key's unnamed (default) value
const DEFAULT_VALUE_NAME: &str = "(default)";

#[derive(Debug, Clone, PartialEq)]
enum Operation {
    SetValue {
        key: KeyPath,
        name: String,
        value: ConfigValue,
    },
    DeleteValue {
        key: KeyPath,
        name: String,
    },
    DeleteKey {
        key: KeyPath,
    },
}

/// A script performing one registry change out of process
#[derive(Debug, Clone, PartialEq)]
pub struct ElevatedScript {
    operation: Operation,
}

impl ElevatedScript {
    /// Create the key if needed, set the value, read it back
    pub fn set_value(key: &KeyPath, name: &str, value: &ConfigValue) -> Self {
        Self {
            operation: Operation::SetValue {
                key: key.clone(),
                name: name.to_string(),
                value: value.clone(),
            },
        }
    }

    /// Remove one value, then confirm it is gone
    pub fn delete_value(key: &KeyPath, name: &str) -> Self {
        Self {
            operation: Operation::DeleteValue {
                key: key.clone(),
                name: name.to_string(),
            },
        }
    }

    /// Remove the key and its subtree, then confirm it is gone
    pub fn delete_key(key: &KeyPath) -> Self {
        Self {
            operation: Operation::DeleteKey { key: key.clone() },
        }
    }

    pub fn key(&self) -> &KeyPath {
        match &self.operation {
            Operation::SetValue { key, .. }
            | Operation::DeleteValue { key, .. }
            | Operation::DeleteKey { key } => key,
        }
    }

    /// Script source text
    pub fn render(&self) -> String {
        let mut lines = vec!["$ErrorActionPreference = 'Stop'".to_string()];

        match &self.operation {
            Operation::SetValue { key, name, value } => {
                let name = quote_value_name(name);
                lines.push(format!("$path = {}", quote_single(&key.powershell_path())));
                lines.push(
                    "if (-not (Test-Path -LiteralPath $path)) { New-Item -Path $path -Force | Out-Null }"
                        .to_string(),
                );
                if key.is_policy_path() {
                    lines.extend(loosen_acl_lines());
                }
                lines.push(format!(
                    "New-ItemProperty -LiteralPath $path -Name {} -PropertyType {} -Value {} -Force | Out-Null",
                    name,
                    value.kind().powershell_type(),
                    value.to_script_literal()
                ));
                lines.push(format!(
                    "$check = Get-ItemProperty -LiteralPath $path -Name {} -ErrorAction SilentlyContinue",
                    name
                ));
                lines.push(format!(
                    "if ($null -eq $check) {{ throw \"Value {} was not written to $path\" }}",
                    name.replace('\'', "")
                ));
            }
            Operation::DeleteValue { key, name } => {
                let name = quote_value_name(name);
                lines.push(format!("$path = {}", quote_single(&key.powershell_path())));
                lines.push(format!(
                    "if (Test-Path -LiteralPath $path) {{ Remove-ItemProperty -LiteralPath $path -Name {} -Force -ErrorAction SilentlyContinue }}",
                    name
                ));
                lines.push(format!(
                    "if ((Test-Path -LiteralPath $path) -and ($null -ne (Get-ItemProperty -LiteralPath $path -Name {} -ErrorAction SilentlyContinue))) {{ throw \"Value {} still exists in $path\" }}",
                    name,
                    name.replace('\'', "")
                ));
            }
            Operation::DeleteKey { key } => {
                lines.push(format!("$path = {}", quote_single(&key.powershell_path())));
                lines.push(
                    "if (Test-Path -LiteralPath $path) { Remove-Item -LiteralPath $path -Recurse -Force }"
                        .to_string(),
                );
                lines.push(
                    "if (Test-Path -LiteralPath $path) { throw \"Key $path still exists\" }".to_string(),
                );
            }
        }

        lines.join("\n")
    }

    /// Base64 of the UTF-16LE script text, for `-EncodedCommand`
    pub fn encoded(&self) -> String {
        let bytes: Vec<u8> = self
            .render()
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        STANDARD.encode(bytes)
    }
}

fn quote_value_name(name: &str) -> String {
    if name.is_empty() {
        quote_single(DEFAULT_VALUE_NAME)
    } else {
        quote_single(name)
    }
}

fn loosen_acl_lines() -> Vec<String> {
    vec![
        "try {".to_string(),
        "  $acl = Get-Acl -LiteralPath $path".to_string(),
        "  $identity = [System.Security.Principal.WindowsIdentity]::GetCurrent().Name".to_string(),
        "  $rule = New-Object System.Security.AccessControl.RegistryAccessRule($identity, 'FullControl', 'ContainerInherit', 'None', 'Allow')".to_string(),
        "  $acl.SetAccessRule($rule)".to_string(),
        "  Set-Acl -LiteralPath $path -AclObject $acl".to_string(),
        "} catch { Write-Warning \"Could not adjust ACL on ${path}: $_\" }".to_string(),
    ]
}
