//! Regex search over a directory tree.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::RegexBuilder;
use tracing::{debug, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use crate::core::types::GrepMatch;
use crate::io::files::looks_binary;

/// A `grep_search` request.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub case_sensitive: bool,
    /// Comma-separated globs; only files whose name or relative path matches are searched.
    pub include_pattern: Option<&'a str>,
    /// Comma-separated globs; files whose name or relative path matches are skipped.
    pub exclude_pattern: Option<&'a str>,
    pub max_results: usize,
}

/// Search every text file under `root` for lines matching `request.query`.
///
/// Files are visited in sorted path order and hidden entries are skipped. Globs are
/// matched against the file name and the `/`-separated path relative to `root`.
/// At most `max_results` matches are returned; zero matches is not an error.
#[instrument(skip_all, fields(root = %root.display(), query = request.query))]
pub fn grep_search(root: &Path, request: &SearchRequest<'_>) -> Result<Vec<GrepMatch>> {
    if !root.is_dir() {
        bail!("Search directory {} does not exist", root.display());
    }
    let regex = RegexBuilder::new(request.query)
        .case_insensitive(!request.case_sensitive)
        .build()
        .with_context(|| format!("Invalid regex pattern `{}`", request.query))?;
    let include = request.include_pattern.and_then(compile_globs);
    let exclude = request.exclude_pattern.and_then(compile_globs);

    let mut matches = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(err = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name();
        let relative = relative_display(root, entry.path());
        let selects = |set: &GlobSet| set.is_match(name) || set.is_match(&relative);
        if include.as_ref().is_some_and(|set| !selects(set)) {
            continue;
        }
        if exclude.as_ref().is_some_and(selects) {
            continue;
        }
        let Ok(bytes) = fs::read(entry.path()) else {
            debug!(path = %entry.path().display(), "skipping unreadable file");
            continue;
        };
        if looks_binary(&bytes) {
            continue;
        }
        let text = String::from_utf8_lossy(&bytes);
        for (i, line) in text.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(GrepMatch {
                    file: relative.clone(),
                    line: i + 1,
                    content: line.trim_end().to_string(),
                });
                if matches.len() >= request.max_results {
                    debug!(max_results = request.max_results, "result cap reached");
                    return Ok(matches);
                }
            }
        }
    }
    debug!(matches = matches.len(), "search finished");
    Ok(matches)
}

/// Compile comma-separated globs. Invalid globs are skipped; `None` if none remain.
pub fn compile_globs(patterns: &str) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut added = 0usize;
    for pattern in patterns.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
                added += 1;
            }
            Err(err) => warn!(pattern, err = %err, "ignoring invalid glob"),
        }
    }
    if added == 0 {
        return None;
    }
    builder
        .build()
        .inspect_err(|err| warn!(err = %err, "ignoring glob set"))
        .ok()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
