//! Directory walks and logical name normalization.

use std::path::Path;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into.
const SKIP_DIRS: &[&str] = &[".git"];

/// Walks `roots` depth first, yielding every non-directory entry in name
/// order. Symlinks are reported, not followed. Unreadable entries are logged
/// and skipped.
pub fn walk_files<P: AsRef<Path>>(roots: &[P]) -> impl Iterator<Item = DirEntry> + '_ {
    roots.iter().flat_map(|root| {
        WalkDir::new(root.as_ref())
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && e.depth() > 0
                    && SKIP_DIRS.iter().any(|s| e.file_name() == *s))
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable path");
                    None
                }
            })
            .filter(|e| !e.file_type().is_dir())
    })
}

/// Canonical form of a logical name: `/` separators, no empty or `.`
/// components, line breaks replaced by spaces.
///
/// ```
/// use cairn_core::clean_name;
///
/// assert_eq!(clean_name("./a\\b//c/"), "a/b/c");
/// assert_eq!(clean_name("x\ny"), "x y");
/// ```
pub fn clean_name(name: &str) -> String {
    let name = name.replace('\\', "/").replace(['\r', '\n'], " ");
    name.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Logical name for a walked path under `prefix`.
pub fn name_for(prefix: &str, path: &Path) -> String {
    let path = path.to_string_lossy();
    if prefix.is_empty() {
        clean_name(&path)
    } else {
        clean_name(&format!("{}/{}", prefix, path))
    }
}
