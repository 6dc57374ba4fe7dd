//! Filesystem operations behind the file tools.
//!
//! Functions return `anyhow` errors whose messages are shown to the planner, so
//! they name the path as the planner wrote it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

/// Bytes inspected when sniffing for binary content.
const SNIFF_BYTES: usize = 8 * 1024;

/// Resolve a planner-supplied path against the working directory.
///
/// Absolute paths are used as given.
pub fn resolve_path(working_dir: &Path, target: &str) -> PathBuf {
    working_dir.join(target.trim())
}

/// True if the bytes look like a binary file (a NUL byte near the start).
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(SNIFF_BYTES)].contains(&0)
}

/// Read a whole file as UTF-8 text, refusing directories and binary files.
pub fn read_text(path: &Path, shown: &str) -> Result<String> {
    if !path.exists() {
        bail!("File {shown} does not exist");
    }
    if path.is_dir() {
        bail!("{shown} is a directory, not a file");
    }
    let bytes = fs::read(path).with_context(|| format!("read {shown}"))?;
    if looks_binary(&bytes) {
        bail!("File {shown} appears to be binary");
    }
    String::from_utf8(bytes).with_context(|| format!("File {shown} is not valid UTF-8 text"))
}

/// Read a file with `N: ` line-number prefixes, optionally limited to a 1-indexed
/// inclusive line range.
///
/// With no range the whole file is returned. A range may cover at most `max_lines`
/// lines (`max_lines` must be positive); an end past the file is clamped, a start
/// past the file is an error.
pub fn read_numbered(
    path: &Path,
    shown: &str,
    start: Option<usize>,
    end: Option<usize>,
    max_lines: usize,
) -> Result<String> {
    let content = read_text(path, shown)?;
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let total = lines.len();

    let (first, last) = if start.is_none() && end.is_none() {
        (1, total)
    } else {
        let first = start.unwrap_or(1);
        if first < 1 {
            bail!("start_line_one_indexed must be at least 1");
        }
        // An open-ended range reads as far as the line cap allows.
        let last = end.unwrap_or_else(|| {
            total
                .max(first)
                .min(first.saturating_add(max_lines - 1))
        });
        if last < first {
            bail!("end_line_one_indexed ({last}) must be >= start_line_one_indexed ({first})");
        }
        if last - first + 1 > max_lines {
            bail!("Cannot read more than {max_lines} lines at once (requested {first}-{last})");
        }
        if first > total {
            bail!("start_line_one_indexed ({first}) exceeds file length ({total} lines)");
        }
        (first, last.min(total))
    };

    debug!(file = shown, first, last, total, "read file range");
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate().take(last).skip(first.saturating_sub(1)) {
        out.push_str(&format!("{}: {line}", i + 1));
    }
    Ok(out)
}

/// Replace a file's contents via a sibling temp file and rename.
///
/// The original file's permissions carry over to the replacement.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("path missing file name {}", path.display()))?;
    let tmp_path = parent.join(format!(".{}.codeflow.tmp", file_name.to_string_lossy()));
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(&tmp_path, meta.permissions())
            .with_context(|| format!("copy permissions to {}", tmp_path.display()))?;
    }
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("replace {}", path.display()));
    }
    Ok(())
}

/// Delete a single file. Directories are refused.
pub fn delete_file(path: &Path, shown: &str) -> Result<()> {
    if !path.exists() {
        bail!("File {shown} does not exist");
    }
    if path.is_dir() {
        bail!("{shown} is a directory; only files can be deleted");
    }
    fs::remove_file(path).with_context(|| format!("delete {shown}"))
}
