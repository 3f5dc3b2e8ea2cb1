//! Typed registry values
//!
//! [`ConfigValue`] is a tagged union over the registry value kinds the engine
//! reads and writes. Comparison is defined once per kind by
//! [`ConfigValue::matches`].

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Kind tag of a [`ConfigValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Dword,
    Qword,
    String,
    ExpandString,
    MultiString,
    Binary,
}

impl ValueKind {
    /// `reg.exe` type flag
    pub fn reg_type(&self) -> &'static str {
        match self {
            ValueKind::Dword => "REG_DWORD",
            ValueKind::Qword => "REG_QWORD",
            ValueKind::String => "REG_SZ",
            ValueKind::ExpandString => "REG_EXPAND_SZ",
            ValueKind::MultiString => "REG_MULTI_SZ",
            ValueKind::Binary => "REG_BINARY",
        }
    }

    /// `-PropertyType` argument for `New-ItemProperty`
    pub fn powershell_type(&self) -> &'static str {
        match self {
            ValueKind::Dword => "DWord",
            ValueKind::Qword => "QWord",
            ValueKind::String => "String",
            ValueKind::ExpandString => "ExpandString",
            ValueKind::MultiString => "MultiString",
            ValueKind::Binary => "Binary",
        }
    }

    /// Zero/empty value of this kind, written when a value only needs to exist
    pub fn empty_value(&self) -> ConfigValue {
        match self {
            ValueKind::Dword => ConfigValue::Dword(0),
            ValueKind::Qword => ConfigValue::Qword(0),
            ValueKind::String => ConfigValue::String(String::new()),
            ValueKind::ExpandString => ConfigValue::ExpandString(String::new()),
            ValueKind::MultiString => ConfigValue::MultiString(Vec::new()),
            ValueKind::Binary => ConfigValue::Binary(Vec::new()),
        }
    }

    /// Parse user input into a value of this kind.
    ///
    /// Integers accept decimal or `0x` hex; multi-strings are split on `;`;
    /// binary accepts hex digits with optional `,` or space separators.
    pub fn parse_value(&self, input: &str) -> Result<ConfigValue, DomainError> {
        let invalid = || DomainError::InvalidValue {
            kind: self.to_string(),
            input: input.to_string(),
        };
        let trimmed = input.trim();

        match self {
            ValueKind::Dword => parse_integer(trimmed)
                .and_then(|n| u32::try_from(n).ok().or_else(|| i32::try_from(n).ok().map(|v| v as u32)))
                .map(ConfigValue::Dword)
                .ok_or_else(invalid),
            ValueKind::Qword => parse_integer(trimmed)
                .and_then(|n| u64::try_from(n).ok().or_else(|| i64::try_from(n).ok().map(|v| v as u64)))
                .map(ConfigValue::Qword)
                .ok_or_else(invalid),
            ValueKind::String => Ok(ConfigValue::String(input.to_string())),
            ValueKind::ExpandString => Ok(ConfigValue::ExpandString(input.to_string())),
            ValueKind::MultiString => Ok(ConfigValue::MultiString(
                input
                    .split(';')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            ValueKind::Binary => {
                let digits: String = trimmed
                    .trim_start_matches("0x")
                    .chars()
                    .filter(|c| !matches!(c, ',' | ' '))
                    .collect();
                if digits.len() % 2 != 0 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid());
                }
                digits
                    .as_bytes()
                    .chunks(2)
                    .map(|pair| {
                        std::str::from_utf8(pair)
                            .ok()
                            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                            .ok_or_else(invalid)
                    })
                    .collect::<Result<Vec<u8>, _>>()
                    .map(ConfigValue::Binary)
            }
        }
    }

    /// Convert a loosely typed JSON value (as found in catalogs) into a value
    /// of this kind.
    pub fn value_from_json(&self, json: &serde_json::Value) -> Result<ConfigValue, DomainError> {
        use serde_json::Value;
        let invalid = || DomainError::InvalidValue {
            kind: self.to_string(),
            input: json.to_string(),
        };

        match (self, json) {
            (_, Value::String(s)) => self.parse_value(s),
            (ValueKind::Dword | ValueKind::Qword, Value::Number(_))
            | (ValueKind::String | ValueKind::ExpandString, Value::Number(_) | Value::Bool(_)) => {
                self.parse_value(&json.to_string())
            }
            (ValueKind::Dword | ValueKind::Qword, Value::Bool(b)) => {
                self.parse_value(if *b { "1" } else { "0" })
            }
            (ValueKind::MultiString, Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
                .collect::<Result<Vec<_>, _>>()
                .map(ConfigValue::MultiString),
            (ValueKind::Binary, Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(invalid)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ConfigValue::Binary),
            _ => Err(invalid()),
        }
    }
}

fn parse_integer(input: &str) -> Option<i128> {
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValueKind::Dword => "dword",
            ValueKind::Qword => "qword",
            ValueKind::String => "string",
            ValueKind::ExpandString => "expand_string",
            ValueKind::MultiString => "multi_string",
            ValueKind::Binary => "binary",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ValueKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dword" | "reg_dword" | "u32" => Ok(ValueKind::Dword),
            "qword" | "reg_qword" | "u64" => Ok(ValueKind::Qword),
            "string" | "sz" | "reg_sz" => Ok(ValueKind::String),
            "expand_string" | "expandstring" | "expand_sz" | "reg_expand_sz" => {
                Ok(ValueKind::ExpandString)
            }
            "multi_string" | "multistring" | "multi_sz" | "reg_multi_sz" => {
                Ok(ValueKind::MultiString)
            }
            "binary" | "reg_binary" => Ok(ValueKind::Binary),
            _ => Err(DomainError::InvalidKind(s.to_string())),
        }
    }
}

/// A registry value tagged with its kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ConfigValue {
    Dword(u32),
    Qword(u64),
    String(String),
    ExpandString(String),
    MultiString(Vec<String>),
    Binary(Vec<u8>),
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Dword(_) => ValueKind::Dword,
            ConfigValue::Qword(_) => ValueKind::Qword,
            ConfigValue::String(_) => ValueKind::String,
            ConfigValue::ExpandString(_) => ValueKind::ExpandString,
            ConfigValue::MultiString(_) => ValueKind::MultiString,
            ConfigValue::Binary(_) => ValueKind::Binary,
        }
    }

    /// Numeric view, widened to signed 64-bit
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Dword(v) => Some(i64::from(*v as i32)),
            ConfigValue::Qword(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// String view for the two string kinds
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) | ConfigValue::ExpandString(s) => Some(s),
            _ => None,
        }
    }

    /// Kind-aware equality
    ///
    /// Numbers compare after signed widening to `i64`, strings compare
    /// case-insensitively, byte arrays compare element-wise. Any other
    /// pairing compares string forms.
    ///
    /// ```
    /// use regpilot_domain::registry::ConfigValue;
    ///
    /// assert!(ConfigValue::Dword(1).matches(&ConfigValue::Qword(1)));
    /// assert!(ConfigValue::String("On".into()).matches(&ConfigValue::ExpandString("on".into())));
    /// assert!(ConfigValue::Dword(1).matches(&ConfigValue::String("1".into())));
    /// assert!(!ConfigValue::Binary(vec![1, 2]).matches(&ConfigValue::Binary(vec![2, 1])));
    /// ```
    pub fn matches(&self, other: &ConfigValue) -> bool {
        if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.as_str(), other.as_str()) {
            return a.to_lowercase() == b.to_lowercase();
        }
        if let (ConfigValue::Binary(a), ConfigValue::Binary(b)) = (self, other) {
            return a == b;
        }
        self.comparison_form() == other.comparison_form()
    }

    fn comparison_form(&self) -> String {
        match self {
            ConfigValue::MultiString(items) => items.join("\0"),
            other => other.to_string(),
        }
    }

    /// Literal accepted by PowerShell's `-Value` parameter
    pub fn to_script_literal(&self) -> String {
        match self {
            ConfigValue::Dword(v) => format!("0x{:08X}", v),
            ConfigValue::Qword(v) => format!("0x{:016X}", v),
            ConfigValue::String(s) | ConfigValue::ExpandString(s) => quote_single(s),
            ConfigValue::MultiString(items) => format!(
                "@({})",
                items.iter().map(|s| quote_single(s)).collect::<Vec<_>>().join(",")
            ),
            ConfigValue::Binary(bytes) if bytes.is_empty() => "([byte[]]@())".to_string(),
            ConfigValue::Binary(bytes) => format!(
                "([byte[]]({}))",
                bytes
                    .iter()
                    .map(|b| format!("0x{:02x}", b))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }
}

/// Quote a string as a PowerShell single-quoted literal
pub fn quote_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValue::Dword(v) => write!(f, "{}", v),
            ConfigValue::Qword(v) => write!(f, "{}", v),
            ConfigValue::String(s) | ConfigValue::ExpandString(s) => f.write_str(s),
            ConfigValue::MultiString(items) => f.write_str(&items.join("; ")),
            ConfigValue::Binary(bytes) => {
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl From<u32> for ConfigValue {
    fn from(v: u32) -> Self {
        ConfigValue::Dword(v)
    }
}

impl From<u64> for ConfigValue {
    fn from(v: u64) -> Self {
        ConfigValue::Qword(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::String(v.to_string())
    }
}

impl From<Vec<u8>> for ConfigValue {
    fn from(v: Vec<u8>) -> Self {
        ConfigValue::Binary(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_numeric_widening() {
        assert_eq!(ConfigValue::Dword(u32::MAX).as_i64(), Some(-1));
        assert_eq!(ConfigValue::Qword(u64::MAX).as_i64(), Some(-1));
        assert!(ConfigValue::Dword(u32::MAX).matches(&ConfigValue::Qword(u64::MAX)));
        assert!(!ConfigValue::Dword(u32::MAX).matches(&ConfigValue::Qword(u64::from(u32::MAX))));
        assert!(ConfigValue::Dword(7).matches(&ConfigValue::Qword(7)));
        assert!(!ConfigValue::Dword(0).matches(&ConfigValue::Qword(1)));
    }

    #[test]
    fn test_binary_rejects_non_hex_text() {
        assert!(ValueKind::Binary.parse_value("aéb").is_err());
        assert!(ValueKind::Binary.parse_value("zz").is_err());
        assert_eq!(
            ValueKind::Binary.parse_value("0x0a,ff").unwrap(),
            ConfigValue::Binary(vec![0x0a, 0xff])
        );
    }

    #[test]
    fn test_strings_case_insensitive() {
        assert!(ConfigValue::String("Enabled".into()).matches(&ConfigValue::String("ENABLED".into())));
        assert!(!ConfigValue::String("a".into()).matches(&ConfigValue::String("b".into())));
    }

    #[test]
    fn test_multi_string_compares_string_form() {
        let a = ConfigValue::MultiString(vec!["a".into(), "b".into()]);
        let b = ConfigValue::MultiString(vec!["a".into(), "b".into()]);
        let c = ConfigValue::MultiString(vec!["a; b".into()]);
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }

    #[test]
    fn test_mixed_pairing_falls_back_to_string_form() {
        assert!(ConfigValue::Dword(42).matches(&ConfigValue::String("42".into())));
        assert!(ConfigValue::Binary(vec![0xab]).matches(&ConfigValue::String("ab".into())));
        assert!(!ConfigValue::Dword(42).matches(&ConfigValue::Binary(vec![42])));
    }

    #[test]
    fn test_kind_parse_accepts_many_spellings() {
        assert_eq!("REG_DWORD".parse::<ValueKind>().ok(), Some(ValueKind::Dword));
        assert_eq!("ExpandString".parse::<ValueKind>().ok(), Some(ValueKind::ExpandString));
        assert_eq!("multi_sz".parse::<ValueKind>().ok(), Some(ValueKind::MultiString));
        assert_eq!(
            "REG_NONE".parse::<ValueKind>().unwrap_err(),
            DomainError::InvalidKind("REG_NONE".into())
        );
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(ValueKind::Dword.parse_value("0x10").unwrap(), ConfigValue::Dword(16));
        assert_eq!(ValueKind::Dword.parse_value("-1").unwrap(), ConfigValue::Dword(u32::MAX));
        assert!(ValueKind::Dword.parse_value("4294967296").is_err());
        assert!(ValueKind::Dword.parse_value("abc").is_err());
        assert_eq!(
            ValueKind::MultiString.parse_value("a;b").unwrap(),
            ConfigValue::MultiString(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            ValueKind::Binary.parse_value("01,ff").unwrap(),
            ConfigValue::Binary(vec![1, 255])
        );
        assert!(ValueKind::Binary.parse_value("abc").is_err());
    }

    #[test]
    fn test_value_from_json() {
        use serde_json::json;
        assert_eq!(ValueKind::Dword.value_from_json(&json!(1)).unwrap(), ConfigValue::Dword(1));
        assert_eq!(ValueKind::Dword.value_from_json(&json!(true)).unwrap(), ConfigValue::Dword(1));
        assert_eq!(
            ValueKind::String.value_from_json(&json!(5)).unwrap(),
            ConfigValue::String("5".into())
        );
        assert_eq!(
            ValueKind::Binary.value_from_json(&json!([0, 16])).unwrap(),
            ConfigValue::Binary(vec![0, 16])
        );
        assert!(ValueKind::Binary.value_from_json(&json!([300])).is_err());
        assert!(ValueKind::MultiString.value_from_json(&json!([1])).is_err());
    }

    #[test]
    fn test_script_literals() {
        assert_eq!(ConfigValue::Dword(1).to_script_literal(), "0x00000001");
        assert_eq!(ConfigValue::String("it's".into()).to_script_literal(), "'it''s'");
        assert_eq!(
            ConfigValue::MultiString(vec!["a".into(), "b".into()]).to_script_literal(),
            "@('a','b')"
        );
        assert_eq!(
            ConfigValue::Binary(vec![1, 0xfe]).to_script_literal(),
            "([byte[]](0x01,0xfe))"
        );
    }

    proptest! {
        #[test]
        fn prop_matches_is_reflexive_for_dwords(v in any::<u32>()) {
            prop_assert!(ConfigValue::Dword(v).matches(&ConfigValue::Dword(v)));
        }

        #[test]
        fn prop_matches_is_symmetric_for_strings(a in "[a-zA-Z]{0,8}", b in "[a-zA-Z]{0,8}") {
            let x = ConfigValue::String(a);
            let y = ConfigValue::ExpandString(b);
            prop_assert_eq!(x.matches(&y), y.matches(&x));
        }

        #[test]
        fn prop_dword_display_parses_back(v in any::<u32>()) {
            let parsed = ValueKind::Dword.parse_value(&ConfigValue::Dword(v).to_string()).unwrap();
            prop_assert!(parsed.matches(&ConfigValue::Dword(v)));
        }
    }
}
