//! Recursive ZIP extraction.
//!
//! Every `.zip` under the root (case-insensitive, any depth) is extracted into a directory
//! next to it named after the archive stem: `dir/rides_2022.zip` → `dir/rides_2022/`.
//! Existing files in that directory are overwritten entry by entry; the directory is never
//! cleared first, so extraction is not idempotent.
//!
//! A corrupt archive is recorded and the walk moves on. With
//! [`NestedArchivePolicy::SinglePass`] the tree is enumerated once, so archives that only
//! appear as the result of an extraction are left for the next run. With
//! [`NestedArchivePolicy::FixedPoint`] the tree is re-walked until no archive that has
//! not been processed remains, for at most [`MAX_FIXED_POINT_PASSES`] walks.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, error, info, warn};

use crate::config::NestedArchivePolicy;
use crate::error::{ExtractError, PhaseError};
use crate::walk::{collect_files, has_suffix_ignore_case};

pub const ARCHIVE_EXTENSION: &str = ".zip";
pub const MAX_FIXED_POINT_PASSES: usize = 16;

/// An archive file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArchive {
    pub path: PathBuf,
    /// File name without the final extension.
    pub stem: String,
}

impl LocalArchive {
    pub fn new(path: PathBuf) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, stem }
    }

    /// Sibling directory the archive extracts into.
    pub fn destination(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.stem)
    }
}

/// One extraction attempt. On success the outcome holds the number of files written.
#[derive(Debug)]
pub struct ExtractionResult {
    pub archive: PathBuf,
    pub destination: PathBuf,
    pub outcome: Result<usize, ExtractError>,
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExtractionResult", 4)?;
        state.serialize_field("archive", &self.archive)?;
        state.serialize_field("destination", &self.destination)?;
        match &self.outcome {
            Ok(files) => {
                state.serialize_field("files", files)?;
                state.serialize_field("error", &None::<String>)?;
            }
            Err(e) => {
                state.serialize_field("files", &0usize)?;
                state.serialize_field("error", &Some(e.to_string()))?;
            }
        }
        state.end()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ExtractReport {
    /// Archives attempted, across all passes.
    pub found: usize,
    pub results: Vec<ExtractionResult>,
    /// Walks that found at least one archive to process.
    pub passes: usize,
}

impl ExtractReport {
    pub fn extracted(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn corrupt(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(&r.outcome, Err(e) if e.is_corrupt()))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_err()).count()
    }
}

/// Every archive under `root`, in traversal order.
pub fn find_archives(root: &Path) -> io::Result<Vec<LocalArchive>> {
    Ok(
        collect_files(root, |p| has_suffix_ignore_case(p, ARCHIVE_EXTENSION))?
            .into_iter()
            .map(LocalArchive::new)
            .collect(),
    )
}

/// Extract all archives under `root` according to `policy`.
///
/// Only a failure to enumerate the tree is returned as an error.
pub fn extract_all(
    root: &Path,
    policy: NestedArchivePolicy,
    delete_archives: bool,
) -> Result<ExtractReport, PhaseError> {
    info!(root = %root.display(), ?policy, "Starting recursive archive extraction");
    let mut report = ExtractReport::default();
    let mut processed: HashSet<PathBuf> = HashSet::new();

    loop {
        let pending: Vec<LocalArchive> = find_archives(root)
            .map_err(|e| PhaseError::Walk {
                path: root.to_path_buf(),
                source: e,
            })?
            .into_iter()
            .filter(|a| !processed.contains(&a.path))
            .collect();
        if pending.is_empty() {
            break;
        }
        report.passes += 1;
        report.found += pending.len();
        debug!(pass = report.passes, archives = pending.len(), "Extraction pass");

        for archive in pending {
            processed.insert(archive.path.clone());
            let outcome = extract_archive(&archive);
            match &outcome {
                Ok(files) => {
                    info!(
                        archive = %archive.path.display(),
                        destination = %archive.destination().display(),
                        files,
                        "Extracted archive"
                    );
                    if delete_archives {
                        remove_archive(&archive.path);
                    }
                }
                Err(e) => {
                    error!(archive = %archive.path.display(), error = %e, "Extraction failed")
                }
            }
            report.results.push(ExtractionResult {
                destination: archive.destination(),
                archive: archive.path,
                outcome,
            });
        }

        if policy == NestedArchivePolicy::SinglePass {
            break;
        }
        if report.passes >= MAX_FIXED_POINT_PASSES {
            warn!(
                passes = report.passes,
                "Stopping nested extraction, pass limit reached"
            );
            break;
        }
    }

    info!(
        found = report.found,
        extracted = report.extracted(),
        corrupt = report.corrupt(),
        passes = report.passes,
        "Archive extraction complete"
    );
    Ok(report)
}

fn remove_archive(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(archive = %path.display(), "Deleted extracted archive"),
        Err(e) => {
            warn!(archive = %path.display(), error = ?e, "Failed to delete extracted archive")
        }
    }
}

/// Extract one archive into its destination, returning the number of files written.
pub fn extract_archive(archive: &LocalArchive) -> Result<usize, ExtractError> {
    let file = File::open(&archive.path).map_err(|e| ExtractError::Io {
        path: archive.path.clone(),
        source: e,
    })?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| corrupt(&archive.path, e))?;

    let destination = archive.destination();
    fs::create_dir_all(&destination).map_err(|e| ExtractError::Io {
        path: destination.clone(),
        source: e,
    })?;

    let mut written = 0usize;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| corrupt(&archive.path, e))?;
        let relative = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                warn!(
                    archive = %archive.path.display(),
                    entry = entry.name(),
                    "Skipping entry with unsafe path"
                );
                continue;
            }
        };
        let out_path = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| ExtractError::Io {
                path: out_path.clone(),
                source: e,
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtractError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let mut out_file = File::create(&out_path).map_err(|e| ExtractError::Io {
            path: out_path.clone(),
            source: e,
        })?;
        io::copy(&mut entry, &mut out_file).map_err(|e| corrupt(&archive.path, e))?;
        debug!(entry = %out_path.display(), "Extracted entry");
        written += 1;
    }
    Ok(written)
}

fn corrupt(path: &Path, reason: impl std::fmt::Display) -> ExtractError {
    ExtractError::CorruptArchive {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
