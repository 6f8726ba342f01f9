//! Flatten every CSV below a root directory into the root itself.
//!
//! A CSV at `root/a/b/data.csv` becomes `root/a_b_data.csv`: the components of the path
//! relative to the root are joined with `_`, and the extension is kept once. CSVs that
//! already sit directly in the root are left alone.
//!
//! Names that contain `_` themselves can make two different relative paths join to the
//! same string (`a_b/c.csv` and `a/b_c.csv`). Such inputs are not supported: the first
//! file claims the name and later ones are reported as [`MoveFailure`]s and stay in place.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{MoveFailure, PhaseError};
use crate::walk::{collect_files, ends_with_ignore_case, has_suffix_ignore_case};

pub const CSV_EXTENSION: &str = ".csv";
pub const NAME_SEPARATOR: &str = "_";

/// A CSV found below the root and the flat name it moves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvRecord {
    pub source: PathBuf,
    pub target_name: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ConsolidateReport {
    /// CSV files found strictly below the root.
    pub found: usize,
    pub moved: Vec<CsvRecord>,
    pub failures: Vec<MoveFailure>,
}

/// Flat file name for a path relative to the consolidation root.
///
/// Returns `None` for paths with no normal components.
pub fn flat_name(relative: &Path) -> Option<String> {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }

    let mut joined = parts.join(NAME_SEPARATOR);
    if ends_with_ignore_case(&joined, CSV_EXTENSION) {
        joined.truncate(joined.len() - CSV_EXTENSION.len());
    }
    joined.push_str(CSV_EXTENSION);
    Some(joined)
}

/// CSV files strictly below `root`, paired with their flat names, in traversal order.
pub fn plan(root: &Path) -> std::io::Result<Vec<CsvRecord>> {
    let records = collect_files(root, |p| has_suffix_ignore_case(p, CSV_EXTENSION))?
        .into_iter()
        .filter(|p| p.parent() != Some(root))
        .filter_map(|source| {
            let relative = source.strip_prefix(root).ok()?;
            let target_name = flat_name(relative)?;
            Some(CsvRecord {
                source,
                target_name,
            })
        })
        .collect();
    Ok(records)
}

/// Move every CSV below `root` into `root` under its flat name.
pub fn consolidate(root: &Path) -> Result<ConsolidateReport, PhaseError> {
    info!(root = %root.display(), "Starting CSV consolidation");
    let records = plan(root).map_err(|e| PhaseError::Walk {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut report = ConsolidateReport {
        found: records.len(),
        ..Default::default()
    };
    let mut claimed: HashSet<String> = HashSet::new();

    for record in records {
        let target = root.join(&record.target_name);
        if !claimed.insert(record.target_name.clone()) {
            error!(
                source = %record.source.display(),
                target = %target.display(),
                "Flat name already used by another file in this run, leaving file in place"
            );
            report.failures.push(MoveFailure {
                path: record.source,
                target,
                cause: "target name already claimed in this run".to_string(),
            });
            continue;
        }

        match fs::rename(&record.source, &target) {
            Ok(()) => {
                debug!(
                    source = %record.source.display(),
                    target = %record.target_name,
                    "Moved CSV"
                );
                report.moved.push(record);
            }
            Err(e) => {
                error!(
                    source = %record.source.display(),
                    target = %target.display(),
                    error = ?e,
                    "Failed to move CSV, leaving file in place"
                );
                report.failures.push(MoveFailure {
                    path: record.source,
                    target,
                    cause: e.to_string(),
                });
            }
        }
    }

    info!(
        found = report.found,
        moved = report.moved.len(),
        failed = report.failures.len(),
        root = %root.display(),
        "CSV consolidation complete"
    );
    Ok(report)
}
