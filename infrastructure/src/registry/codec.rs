//! Raw registry value encoding
//!
//! Converts between [`ConfigValue`] and the little-endian byte layout the
//! registry stores. Strings are UTF-16LE with a terminating NUL; multi-strings
//! are NUL-separated with an extra terminating NUL.

use regpilot_domain::{ConfigValue, ValueKind};

/// Decode raw bytes read for a value of `kind`.
///
/// Types the engine does not model (`kind == None`) and integers with a
/// short payload are surfaced as [`ConfigValue::Binary`].
pub fn decode(kind: Option<ValueKind>, bytes: &[u8]) -> ConfigValue {
    match kind {
        Some(ValueKind::Dword) => match <[u8; 4]>::try_from(bytes.get(..4).unwrap_or_default()) {
            Ok(raw) => ConfigValue::Dword(u32::from_le_bytes(raw)),
            Err(_) => ConfigValue::Binary(bytes.to_vec()),
        },
        Some(ValueKind::Qword) => match <[u8; 8]>::try_from(bytes.get(..8).unwrap_or_default()) {
            Ok(raw) => ConfigValue::Qword(u64::from_le_bytes(raw)),
            Err(_) => ConfigValue::Binary(bytes.to_vec()),
        },
        Some(ValueKind::String) => ConfigValue::String(decode_string(bytes)),
        Some(ValueKind::ExpandString) => ConfigValue::ExpandString(decode_string(bytes)),
        Some(ValueKind::MultiString) => ConfigValue::MultiString(decode_multi_string(bytes)),
        Some(ValueKind::Binary) | None => ConfigValue::Binary(bytes.to_vec()),
    }
}

/// Encode `value` into its kind and raw bytes
pub fn encode(value: &ConfigValue) -> (ValueKind, Vec<u8>) {
    let bytes = match value {
        ConfigValue::Dword(n) => n.to_le_bytes().to_vec(),
        ConfigValue::Qword(n) => n.to_le_bytes().to_vec(),
        ConfigValue::String(s) | ConfigValue::ExpandString(s) => encode_wide(s),
        ConfigValue::MultiString(items) => {
            let mut bytes: Vec<u8> = items.iter().flat_map(|s| encode_wide(s)).collect();
            bytes.extend_from_slice(&[0, 0]);
            bytes
        }
        ConfigValue::Binary(b) => b.clone(),
    };
    (value.kind(), bytes)
}

fn encode_wide(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn wide_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

fn decode_string(bytes: &[u8]) -> String {
    let units = wide_units(bytes);
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}

fn decode_multi_string(bytes: &[u8]) -> Vec<String> {
    wide_units(bytes)
        .split(|&u| u == 0)
        .filter(|part| !part.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}
