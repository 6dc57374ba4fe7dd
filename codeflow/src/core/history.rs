//! Plain-text rendering of the action history for prompts and final responses.

use std::fmt::Write;

use serde_yaml::Value as YamlValue;

use crate::core::types::{GrepMatch, HistoryEntry, ToolResult};

/// Rendered text for an absent or empty history.
pub const NO_HISTORY: &str = "No previous actions.";

const EMPTY_LISTING: &str = "(Empty or inaccessible directory)";

/// Render the whole history, numbered from 1.
///
/// Accepts `None` as well as an empty slice; both render as [`NO_HISTORY`].
pub fn format_history<'a>(history: impl Into<Option<&'a [HistoryEntry]>>) -> String {
    let history = history.into().unwrap_or_default();
    format_recent_history(history, history.len())
}

/// Render only the newest `window` entries, keeping their absolute action numbers.
pub fn format_recent_history(history: &[HistoryEntry], window: usize) -> String {
    if history.is_empty() {
        return NO_HISTORY.to_string();
    }
    let skipped = history.len().saturating_sub(window.max(1));
    let mut out = String::new();
    if skipped > 0 {
        let _ = writeln!(out, "({skipped} earlier actions omitted)\n");
    }
    for (offset, entry) in history[skipped..].iter().enumerate() {
        if offset > 0 {
            out.push('\n');
        }
        write_entry(&mut out, skipped + offset + 1, entry);
    }
    out.truncate(out.trim_end().len());
    out
}

fn write_entry(out: &mut String, number: usize, entry: &HistoryEntry) {
    let _ = writeln!(out, "Action {number}:");
    let _ = writeln!(out, "- Tool: {}", entry.tool);
    let _ = writeln!(out, "- Reason: {}", entry.reason.trim_end());
    if !entry.params.is_empty() {
        out.push_str("- Parameters:\n");
        for (key, value) in &entry.params {
            write_param(out, &scalar_text(key).unwrap_or_default(), value, 1);
        }
    }
    let status = if entry.result.success() {
        "Success"
    } else {
        "Failed"
    };
    let _ = writeln!(out, "- Result: {status}");
    write_result(out, &entry.result);
    if let Some(error) = entry.result.error() {
        let _ = writeln!(out, "- Error: {error}");
    }
}

fn write_param(out: &mut String, key: &str, value: &YamlValue, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        YamlValue::Mapping(mapping) if mapping.is_empty() => {
            let _ = writeln!(out, "{indent}- {key}: {{}}");
        }
        YamlValue::Mapping(mapping) => {
            let _ = writeln!(out, "{indent}- {key}:");
            for (k, v) in mapping {
                write_param(out, &scalar_text(k).unwrap_or_default(), v, depth + 1);
            }
        }
        YamlValue::Sequence(items) if items.is_empty() => {
            let _ = writeln!(out, "{indent}- {key}: []");
        }
        YamlValue::Sequence(items) => {
            let _ = writeln!(out, "{indent}- {key}:");
            for (i, item) in items.iter().enumerate() {
                write_param(out, &format!("[{}]", i + 1), item, depth + 1);
            }
        }
        YamlValue::Tagged(tagged) => write_param(out, key, &tagged.value, depth),
        YamlValue::String(text) if text.contains('\n') => {
            let _ = writeln!(out, "{indent}- {key}: |");
            for line in text.trim_end_matches('\n').lines() {
                let _ = writeln!(out, "{indent}    {line}");
            }
        }
        scalar => {
            let _ = writeln!(out, "{indent}- {key}: {}", scalar_text(scalar).unwrap_or_default());
        }
    }
}

fn scalar_text(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::Null => Some(String::new()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Tagged(tagged) => scalar_text(&tagged.value),
        YamlValue::Sequence(_) | YamlValue::Mapping(_) => None,
    }
}

fn write_result(out: &mut String, result: &ToolResult) {
    match result {
        ToolResult::ReadFile {
            success: true,
            content,
            ..
        } => {
            out.push_str("- Content:\n");
            out.push_str(content);
            if !content.ends_with('\n') {
                out.push('\n');
            }
        }
        ToolResult::GrepSearch {
            success: true,
            matches,
            ..
        } => write_matches(out, matches),
        ToolResult::ListDir {
            success: true,
            tree_visualization,
            ..
        } => {
            out.push_str("- Directory structure:\n");
            if tree_visualization.trim().is_empty() {
                let _ = writeln!(out, "  {EMPTY_LISTING}");
            }
            for line in tree_visualization.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }
        ToolResult::EditFile {
            operations,
            reasoning,
            ..
        } => {
            let _ = writeln!(out, "- Operations: {operations}");
            if !reasoning.trim().is_empty() {
                let _ = writeln!(out, "- Reasoning: {}", reasoning.trim_end());
            }
        }
        _ => {}
    }
}

fn write_matches(out: &mut String, matches: &[GrepMatch]) {
    let _ = writeln!(out, "- Matches: {}", matches.len());
    for (i, m) in matches.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}:{}: {}", i + 1, m.file, m.line, m.content);
    }
}
