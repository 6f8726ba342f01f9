//! Deterministic recursive directory traversal.
//!
//! Directory entries are visited in file-name order, depth first, parents before
//! children.
//!
//! Symbolic links are neither followed nor returned, including links to regular files:
//! a symlinked `.zip` is not extracted and a symlinked `.csv` is not moved. Only real
//! files below the root take part in a run.
//!
//! Only an unreadable root is an error. A subdirectory that cannot be listed is logged
//! and skipped, and the rest of the tree is still collected.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Collect every regular file under `root` (at any depth, including `root` itself)
/// for which `matches` returns true.
pub fn collect_files<F>(root: &Path, matches: F) -> io::Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut results = Vec::new();
    let entries = sorted_entries(root)?;
    visit_entries(entries, &matches, &mut results);
    Ok(results)
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

fn visit_entries<F>(entries: Vec<fs::DirEntry>, matches: &F, results: &mut Vec<PathBuf>)
where
    F: Fn(&Path) -> bool,
{
    for entry in entries {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "Cannot stat entry, skipping");
                continue;
            }
        };
        if file_type.is_dir() {
            visit_subdir(&path, matches, results);
        } else if file_type.is_file() {
            if matches(&path) {
                results.push(path);
            }
        } else {
            debug!(path = %path.display(), "Skipping non-regular entry");
        }
    }
}

fn visit_subdir<F>(dir: &Path, matches: &F, results: &mut Vec<PathBuf>)
where
    F: Fn(&Path) -> bool,
{
    match sorted_entries(dir) {
        Ok(entries) => visit_entries(entries, matches, results),
        Err(e) => warn!(path = %dir.display(), error = ?e, "Cannot read directory, skipping"),
    }
}

/// True when the file name of `path` ends with `suffix`, ignoring ASCII case.
pub fn has_suffix_ignore_case(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .map(|name| ends_with_ignore_case(&name.to_string_lossy(), suffix))
        .unwrap_or(false)
}

pub(crate) fn ends_with_ignore_case(value: &str, suffix: &str) -> bool {
    value.len() >= suffix.len()
        && value.is_char_boundary(value.len() - suffix.len())
        && value[value.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

pub(crate) fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value.len() >= prefix.len()
        && value.is_char_boundary(prefix.len())
        && value[..prefix.len()].eq_ignore_ascii_case(prefix)
}
