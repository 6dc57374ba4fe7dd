//! Collects one directory level for `list_dir`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::core::listing::{DirItem, DirSummary, render_tree};

/// List `path` one level deep as a rendered tree.
///
/// An empty directory renders as an empty string.
pub fn list_dir(path: &Path, shown: &str, max_files: usize) -> Result<String> {
    if !path.exists() {
        bail!("Directory {shown} does not exist");
    }
    if !path.is_dir() {
        bail!("{shown} is not a directory");
    }
    let items = collect_items(path).with_context(|| format!("list {shown}"))?;
    debug!(path = shown, items = items.len(), "listed directory");
    Ok(render_tree(&items, max_files))
}

fn collect_items(path: &Path) -> Result<Vec<DirItem>> {
    let mut items = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            items.push(DirItem::Directory {
                name,
                summary: summarize(&entry.path()),
            });
        } else {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            items.push(DirItem::File { name, size });
        }
    }
    Ok(items)
}

fn summarize(dir: &Path) -> DirSummary {
    let Ok(entries) = fs::read_dir(dir) else {
        return DirSummary::Unreadable;
    };
    let (mut dirs, mut files) = (0, 0);
    for entry in entries.flatten() {
        match entry.file_type() {
            Ok(t) if t.is_dir() => dirs += 1,
            Ok(_) => files += 1,
            Err(_) => {}
        }
    }
    DirSummary::Counts { dirs, files }
}
