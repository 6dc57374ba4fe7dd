//! One-level directory tree rendering.

/// Child counts for a subdirectory shown in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirSummary {
    Counts { dirs: usize, files: usize },
    Unreadable,
}

/// An entry directly under the listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirItem {
    Directory { name: String, summary: DirSummary },
    File { name: String, size: u64 },
}

impl DirItem {
    fn name(&self) -> &str {
        match self {
            DirItem::Directory { name, .. } | DirItem::File { name, .. } => name,
        }
    }

    fn label(&self) -> String {
        match self {
            DirItem::Directory { name, summary } => match summary_text(*summary) {
                Some(summary) => format!("{name}/ ({summary})"),
                None => format!("{name}/"),
            },
            DirItem::File { name, size: 0 } => name.clone(),
            DirItem::File { name, size } => format!("{name} ({})", format_size(*size)),
        }
    }
}

/// Render items as a tree: directories first, then files, each sorted by name.
///
/// At most `max_files` files are shown; the rest collapse into a trailing
/// `... (N more files)` line. An empty item list renders as an empty string.
pub fn render_tree(items: &[DirItem], max_files: usize) -> String {
    let mut dirs: Vec<&DirItem> = items
        .iter()
        .filter(|item| matches!(item, DirItem::Directory { .. }))
        .collect();
    let mut files: Vec<&DirItem> = items
        .iter()
        .filter(|item| matches!(item, DirItem::File { .. }))
        .collect();
    dirs.sort_by(|a, b| a.name().cmp(b.name()));
    files.sort_by(|a, b| a.name().cmp(b.name()));

    let hidden = files.len().saturating_sub(max_files);
    files.truncate(max_files);

    let mut labels: Vec<String> = dirs.iter().chain(&files).map(|item| item.label()).collect();
    if hidden > 0 {
        labels.push(format!("... ({hidden} more {})", plural(hidden, "file", "files")));
    }

    let last = labels.len().saturating_sub(1);
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let connector = if i == last { "└──" } else { "├──" };
            format!("{connector} {label}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summary_text(summary: DirSummary) -> Option<String> {
    match summary {
        DirSummary::Unreadable => Some("unreadable".to_string()),
        DirSummary::Counts { dirs: 0, files: 0 } => Some("empty".to_string()),
        DirSummary::Counts { dirs, files } => {
            let mut parts = Vec::new();
            if dirs > 0 {
                parts.push(format!("{dirs} {}", plural(dirs, "directory", "directories")));
            }
            if files > 0 {
                parts.push(format!("{files} {}", plural(files, "file", "files")));
            }
            Some(parts.join(", "))
        }
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 { one } else { many }
}

/// Human-readable file size in KB with one decimal.
pub fn format_size(bytes: u64) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}
