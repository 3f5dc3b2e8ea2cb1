//! Shared utility functions.

/// Condense process output for a single log line.
///
/// Takes the first non-blank line and cuts it to at most `max_bytes` without
/// splitting a UTF-8 character, appending `...` when anything was dropped.
pub fn summarize_output(output: &str, max_bytes: usize) -> String {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(first) = lines.next() else {
        return String::new();
    };
    let more_lines = lines.next().is_some();

    if first.len() <= max_bytes {
        return if more_lines {
            format!("{}...", first)
        } else {
            first.to_string()
        };
    }
    let mut end = max_bytes;
    while end > 0 && !first.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &first[..end])
}
