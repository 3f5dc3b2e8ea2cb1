//! Parsers for `powercfg` output
//!
//! `powercfg` prints one scheme per line in the form
//! `Power Scheme GUID: <guid>  (<name>) *`, where the trailing `*` marks the
//! active scheme. The label text is localized, so only the GUID, the
//! parenthesised name and the star are relied upon.

use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

/// One scheme line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeEntry {
    pub guid: Uuid,
    pub name: Option<String>,
    pub active: bool,
}

fn scheme_regex() -> Option<&'static Regex> {
    static SCHEME: OnceLock<Option<Regex>> = OnceLock::new();
    SCHEME
        .get_or_init(|| {
            Regex::new(
                r"([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\s*(?:\(([^)]*)\))?\s*(\*)?",
            )
            .ok()
        })
        .as_ref()
}

fn parse_line(line: &str) -> Option<SchemeEntry> {
    let caps = scheme_regex()?.captures(line)?;
    let guid = Uuid::parse_str(caps.get(1)?.as_str()).ok()?;
    Some(SchemeEntry {
        guid,
        name: caps.get(2).map(|m| m.as_str().trim().to_string()),
        active: caps.get(3).is_some(),
    })
}

/// All schemes printed by `powercfg /list`
pub fn parse_scheme_list(output: &str) -> Vec<SchemeEntry> {
    output.lines().filter_map(parse_line).collect()
}

/// The scheme printed by `powercfg /getactivescheme`
pub fn parse_active_scheme(output: &str) -> Option<SchemeEntry> {
    output.lines().find_map(parse_line).map(|mut entry| {
        entry.active = true;
        entry
    })
}

/// The new scheme printed by `powercfg /duplicatescheme`
pub fn parse_duplicated_scheme(output: &str) -> Option<Uuid> {
    output.lines().find_map(parse_line).map(|entry| entry.guid)
}
