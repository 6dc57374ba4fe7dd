//! Line-range change sets produced by the edit planner.
//!
//! A plan is a list of 1-indexed, inclusive `[line_start, line_end]` replacements
//! against the file as it was read. Plans are validated against the current line
//! count before anything is applied, and applied bottom-up so earlier ranges keep
//! their line numbers. A range of `[n + 1, n + 1]` on an `n`-line file appends.

use std::fmt::Write;

use serde::Deserialize;
use thiserror::Error;

use crate::core::yaml::extract_yaml_block;

/// Replace lines `line_start..=line_end` with `new_content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub line_start: usize,
    pub line_end: usize,
    /// Replacement text. One trailing newline is ignored; empty deletes the range.
    pub new_content: String,
    pub reason: String,
}

/// A validated edit plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub reasoning: String,
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeSetError {
    #[error("plan is not valid YAML: {0}")]
    Yaml(String),
    #[error("plan contains no operations")]
    Empty,
    #[error("invalid plan: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPlan {
    #[serde(default)]
    reasoning: String,
    operations: Vec<RawOperation>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOperation {
    start_line: i64,
    end_line: i64,
    replacement: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Parse a planner reply and validate it against a file of `total_lines` lines.
pub fn parse_change_set(reply: &str, total_lines: usize) -> Result<ChangeSet, ChangeSetError> {
    let raw: RawPlan = serde_yaml::from_str(extract_yaml_block(reply))
        .map_err(|err| ChangeSetError::Yaml(err.to_string()))?;

    let mut errors = Vec::new();
    let mut changes = Vec::with_capacity(raw.operations.len());
    for (i, op) in raw.operations.into_iter().enumerate() {
        let n = i + 1;
        let start = positive_line(op.start_line);
        let end = positive_line(op.end_line);
        match (start, end) {
            (Some(line_start), Some(line_end)) => changes.push(Change {
                line_start,
                line_end,
                new_content: op.replacement,
                reason: op.reason.unwrap_or_default().trim().to_string(),
            }),
            _ => errors.push(format!(
                "operation {n}: line numbers must be at least 1 (got {}-{})",
                op.start_line, op.end_line
            )),
        }
    }
    if !errors.is_empty() {
        return Err(ChangeSetError::Invalid(errors));
    }

    let set = ChangeSet {
        reasoning: raw.reasoning.trim().to_string(),
        changes,
    };
    set.validate(total_lines)?;
    Ok(set)
}

fn positive_line(n: i64) -> Option<usize> {
    usize::try_from(n).ok().filter(|&n| n >= 1)
}

impl ChangeSet {
    /// Check every range lies within `1..=total_lines` and no two ranges overlap.
    ///
    /// The single-line range `total_lines + 1` is allowed and appends after the last line.
    pub fn validate(&self, total_lines: usize) -> Result<(), ChangeSetError> {
        if self.changes.is_empty() {
            return Err(ChangeSetError::Empty);
        }
        let mut errors = Vec::new();
        for (i, change) in self.changes.iter().enumerate() {
            let n = i + 1;
            if change.line_start < 1 {
                errors.push(format!("operation {n}: start_line must be at least 1"));
            }
            if change.line_start > change.line_end {
                errors.push(format!(
                    "operation {n}: start_line {} is after end_line {}",
                    change.line_start, change.line_end
                ));
            }
            let append = change.line_start == total_lines + 1 && change.line_end == total_lines + 1;
            if change.line_end > total_lines && !append {
                errors.push(format!(
                    "operation {n}: end_line {} exceeds file length {total_lines}",
                    change.line_end
                ));
            }
        }

        let mut ranges: Vec<(usize, usize, usize)> = self
            .changes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.line_start, c.line_end, i + 1))
            .collect();
        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            let (_, prev_end, prev_n) = pair[0];
            let (start, _, n) = pair[1];
            if start <= prev_end {
                errors.push(format!("operations {prev_n} and {n} overlap"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ChangeSetError::Invalid(errors))
        }
    }

    /// Overall reasoning followed by per-operation reasons, for the history log.
    pub fn rationale(&self) -> String {
        let mut out = self.reasoning.clone();
        for change in self.changes.iter().filter(|c| !c.reason.is_empty()) {
            if !out.is_empty() {
                out.push('\n');
            }
            let _ = write!(
                out,
                "lines {}-{}: {}",
                change.line_start, change.line_end, change.reason
            );
        }
        out
    }

    /// Changes ordered by descending `line_start`; ties keep plan order.
    pub fn application_order(&self) -> Vec<&Change> {
        let mut ordered: Vec<&Change> = self.changes.iter().collect();
        ordered.sort_by(|a, b| b.line_start.cmp(&a.line_start));
        ordered
    }
}

/// A file held as lines, remembering its line terminator and whether it ended
/// with one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    lines: Vec<String>,
    line_ending: &'static str,
    trailing_newline: bool,
}

impl TextBuffer {
    /// The terminator is taken from the first line: `\r\n` if it ends that way, else `\n`.
    pub fn from_content(content: &str) -> Self {
        let line_ending = match content.split_inclusive('\n').next() {
            Some(first) if first.ends_with("\r\n") => "\r\n",
            _ => "\n",
        };
        Self {
            lines: content.lines().map(str::to_string).collect(),
            line_ending,
            trailing_newline: content.ends_with('\n'),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Content prefixed with `N: ` line numbers, as shown to the edit planner.
    pub fn numbered(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            let _ = writeln!(out, "{}: {line}", i + 1);
        }
        out
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join(self.line_ending);
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(self.line_ending);
        }
        out
    }

    fn replace(&mut self, change: &Change) {
        let content = change
            .new_content
            .strip_suffix('\n')
            .unwrap_or(&change.new_content);
        let replacement: Vec<String> = if content.is_empty() {
            Vec::new()
        } else {
            content
                .split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                .collect()
        };
        if self.lines.is_empty() {
            self.trailing_newline = change.new_content.ends_with('\n');
        }
        let end = change.line_end.min(self.lines.len());
        self.lines.splice(change.line_start - 1..end, replacement);
    }
}

/// Apply a validated change set in place. Returns the number of changes applied.
///
/// The set must have been validated against `buffer.line_count()`.
pub fn apply_change_set(buffer: &mut TextBuffer, set: &ChangeSet) -> usize {
    let ordered = set.application_order();
    for change in &ordered {
        buffer.replace(change);
    }
    ordered.len()
}
