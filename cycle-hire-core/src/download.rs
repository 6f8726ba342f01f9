//! # download: fetch listed objects into a local directory
//!
//! Given one [`BucketSource`] and the complete listing of its bucket, [`fetch_source`]
//!   - keeps objects with an allowed extension, a size above `min_size` and a key outside
//!     the exclude prefix ([`select_objects`]),
//!   - orders them most-recently-modified first, so a cap keeps the newest files,
//!   - skips objects whose file already exists locally (see [`SkipPolicy`]),
//!   - downloads the rest through a temporary `.part` file that is renamed into place only
//!     after the transfer completed, so an interrupted download leaves nothing behind.
//!
//! A failed object is recorded in the [`FetchReport`] and the next object is attempted.
//! Only an uncreatable target directory stops the source, and with it the download phase.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{BucketSource, FetchPolicy, SkipPolicy};
use crate::contract::{ObjectStore, RemoteObject};
use crate::error::{DownloadFailure, FetchError};
use crate::walk::{ends_with_ignore_case, starts_with_ignore_case};

/// Outcome of fetching one source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    pub source: String,
    pub bucket: String,
    /// Objects in the listing.
    pub listed: usize,
    /// Objects left after filtering.
    pub matched: usize,
    /// Local paths written by this run, in download order.
    pub downloaded: Vec<PathBuf>,
    /// Objects whose local file was already present.
    pub skipped: usize,
    pub failures: Vec<DownloadFailure>,
    /// True when iteration stopped because the cap was reached.
    pub limit_reached: bool,
}

/// Apply the policy filters and sort the survivors newest first.
///
/// Objects without a timestamp sort after all dated objects; equal timestamps are
/// ordered by key.
pub fn select_objects(objects: &[RemoteObject], policy: &FetchPolicy) -> Vec<RemoteObject> {
    let mut selected: Vec<RemoteObject> = objects
        .iter()
        .filter(|obj| is_wanted(obj, policy))
        .cloned()
        .collect();
    selected.sort_by(newest_first);
    selected
}

fn is_wanted(obj: &RemoteObject, policy: &FetchPolicy) -> bool {
    if obj.key.ends_with('/') || obj.size <= policy.min_size {
        return false;
    }
    if !policy
        .extensions
        .iter()
        .any(|ext| ends_with_ignore_case(&obj.key, ext))
    {
        return false;
    }
    match policy.exclude_prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() => !starts_with_ignore_case(&obj.key, prefix),
        _ => true,
    }
}

fn newest_first(a: &RemoteObject, b: &RemoteObject) -> Ordering {
    match (a.last_modified, b.last_modified) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.key.cmp(&b.key))
}

/// Local destination of `obj` inside `directory`.
pub fn local_path(directory: &Path, obj: &RemoteObject) -> PathBuf {
    directory.join(obj.basename())
}

fn already_fetched(path: &Path, obj: &RemoteObject, skip_policy: SkipPolicy) -> bool {
    match skip_policy {
        SkipPolicy::Exists => path.exists(),
        SkipPolicy::SizeMatches => fs::metadata(path)
            .map(|meta| meta.is_file() && meta.len() == obj.size)
            .unwrap_or(false),
    }
}

/// Download the selected objects of `source` into its directory.
pub async fn fetch_source<S>(
    store: &S,
    source: &BucketSource,
    objects: &[RemoteObject],
    policy: &FetchPolicy,
) -> Result<FetchReport, FetchError>
where
    S: ObjectStore + ?Sized,
{
    let mut report = FetchReport {
        source: source.name.clone(),
        bucket: source.bucket.clone(),
        listed: objects.len(),
        ..Default::default()
    };

    fs::create_dir_all(&source.directory).map_err(|e| {
        error!(
            error = ?e,
            path = %source.directory.display(),
            "Failed to create target directory"
        );
        FetchError::TargetDirectory {
            path: source.directory.clone(),
            source: e,
        }
    })?;

    let selected = select_objects(objects, policy);
    report.matched = selected.len();
    if selected.is_empty() {
        warn!(
            source = %source.name,
            bucket = %source.bucket,
            listed = report.listed,
            "No matching files found in bucket"
        );
        return Ok(report);
    }
    info!(
        source = %source.name,
        bucket = %source.bucket,
        listed = report.listed,
        matched = report.matched,
        max_files = ?policy.max_files,
        "Fetching objects"
    );

    for obj in &selected {
        if policy
            .max_files
            .is_some_and(|max| report.downloaded.len() >= max)
        {
            report.limit_reached = true;
            info!(
                source = %source.name,
                max_files = ?policy.max_files,
                "Download limit reached"
            );
            break;
        }

        let destination = local_path(&source.directory, obj);
        if already_fetched(&destination, obj, policy.skip_policy) {
            debug!(key = %obj.key, path = %destination.display(), "Skipping, already downloaded");
            report.skipped += 1;
            continue;
        }

        debug!(key = %obj.key, size = obj.size, "Downloading object");
        match download_one(store, obj, &source.directory, &destination).await {
            Ok(bytes) => {
                info!(
                    key = %obj.key,
                    bytes,
                    path = %destination.display(),
                    "Downloaded object"
                );
                report.downloaded.push(destination);
            }
            Err(cause) => {
                error!(bucket = %obj.bucket, key = %obj.key, error = %cause, "Download failed");
                report.failures.push(DownloadFailure {
                    bucket: obj.bucket.clone(),
                    key: obj.key.clone(),
                    cause,
                });
            }
        }
    }

    // A cap that was met exactly by the last object still counts as reached.
    if let Some(max) = policy.max_files {
        if report.downloaded.len() >= max {
            report.limit_reached = true;
        }
    }

    info!(
        source = %source.name,
        downloaded = report.downloaded.len(),
        skipped = report.skipped,
        failed = report.failures.len(),
        "Source fetch complete"
    );
    Ok(report)
}

/// Stream one object into a hidden temporary file next to `destination`, then rename it.
async fn download_one<S>(
    store: &S,
    obj: &RemoteObject,
    directory: &Path,
    destination: &Path,
) -> Result<u64, String>
where
    S: ObjectStore + ?Sized,
{
    let partial = tempfile::Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(directory)
        .map_err(|e| format!("cannot create temporary file: {e}"))?;

    let bytes = store
        .download_object(&obj.bucket, &obj.key, partial.path())
        .await
        .map_err(|e| e.to_string())?;

    partial
        .persist(destination)
        .map_err(|e| format!("cannot move download into place: {}", e.error))?;
    Ok(bytes)
}
