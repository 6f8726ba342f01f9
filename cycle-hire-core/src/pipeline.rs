//! High-level pipeline: the two independent phases of an ingestion run.
//!
//! - [`run_download_phase`]: for each configured source, list its bucket and fetch the
//!   selected objects into the source directory.
//! - [`run_extract_phase`]: extract every archive under a directory, then consolidate the
//!   CSVs below it into that directory.
//!
//! The phases are not chained; an operator decides when to run each.
//!
//! # Error Handling
//! Per-item failures (listing of one source, one download, one archive, one move) are
//! collected into the returned report. Only conditions that make the phase meaningless
//! (an uncreatable target directory, a missing or unreadable extract root) are returned
//! as [`PhaseError`]. An uncreatable target directory ends the download phase, so
//! sources after it are not listed.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{DownloadConfig, ExtractConfig};
use crate::consolidate::{consolidate, ConsolidateReport};
use crate::contract::ObjectStore;
use crate::download::{fetch_source, FetchReport};
use crate::error::PhaseError;
use crate::extract::{extract_all, ExtractReport};
use crate::listing::list_bucket;

/// Outcome for one source of the download phase.
#[derive(Debug, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub bucket: String,
    /// Set when the bucket could not be listed; `fetch` is then `None`.
    pub listing_error: Option<String>,
    pub fetch: Option<FetchReport>,
}

#[derive(Debug, Default, Serialize)]
pub struct DownloadPhaseReport {
    pub sources: Vec<SourceReport>,
}

impl DownloadPhaseReport {
    fn fetches(&self) -> impl Iterator<Item = &FetchReport> {
        self.sources.iter().filter_map(|s| s.fetch.as_ref())
    }

    pub fn listed(&self) -> usize {
        self.fetches().map(|f| f.listed).sum()
    }

    pub fn downloaded(&self) -> usize {
        self.fetches().map(|f| f.downloaded.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.fetches().map(|f| f.skipped).sum()
    }

    pub fn failed_downloads(&self) -> usize {
        self.fetches().map(|f| f.failures.len()).sum()
    }

    pub fn listing_failures(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.listing_error.is_some())
            .count()
    }
}

/// List and fetch every source in `config`.
pub async fn run_download_phase<S>(
    config: &DownloadConfig,
    store: &S,
) -> Result<DownloadPhaseReport, PhaseError>
where
    S: ObjectStore + ?Sized,
{
    info!(sources = config.sources.len(), "[DOWNLOAD] Starting download phase");
    let mut report = DownloadPhaseReport::default();

    for source in &config.sources {
        info!(source = %source.name, bucket = %source.bucket, "[DOWNLOAD] Processing source");

        let objects = match list_bucket(store, &source.bucket).await {
            Ok(objects) => objects,
            Err(e) => {
                error!(
                    source = %source.name,
                    bucket = %source.bucket,
                    error = %e,
                    "[DOWNLOAD][ERROR] Listing failed, skipping source"
                );
                report.sources.push(SourceReport {
                    source: source.name.clone(),
                    bucket: source.bucket.clone(),
                    listing_error: Some(e.to_string()),
                    fetch: None,
                });
                continue;
            }
        };

        let fetch = fetch_source(store, source, &objects, &config.policy).await?;
        if !fetch.failures.is_empty() {
            warn!(
                source = %source.name,
                failed = fetch.failures.len(),
                "[DOWNLOAD] Some objects failed to download"
            );
        }
        report.sources.push(SourceReport {
            source: source.name.clone(),
            bucket: source.bucket.clone(),
            listing_error: None,
            fetch: Some(fetch),
        });
    }

    info!(
        listed = report.listed(),
        downloaded = report.downloaded(),
        skipped = report.skipped(),
        failed = report.failed_downloads(),
        listing_failures = report.listing_failures(),
        "[DOWNLOAD] Download phase complete"
    );
    Ok(report)
}

#[derive(Debug, Serialize)]
pub struct ExtractPhaseReport {
    pub root: PathBuf,
    pub extraction: ExtractReport,
    pub consolidation: ConsolidateReport,
}

/// Extract all archives under `config.directory`, then consolidate its CSVs.
pub fn run_extract_phase(config: &ExtractConfig) -> Result<ExtractPhaseReport, PhaseError> {
    let root = &config.directory;
    if !root.is_dir() {
        error!(root = %root.display(), "[EXTRACT][ERROR] Directory not found");
        return Err(PhaseError::RootNotFound(root.clone()));
    }
    info!(root = %root.display(), "[EXTRACT] Starting extract phase");

    let extraction = extract_all(root, config.nested, config.delete_archives)?;
    let consolidation = consolidate(root)?;

    info!(
        archives = extraction.found,
        extracted = extraction.extracted(),
        corrupt = extraction.corrupt(),
        csv_found = consolidation.found,
        csv_moved = consolidation.moved.len(),
        "[EXTRACT] Extract phase complete"
    );
    Ok(ExtractPhaseReport {
        root: root.clone(),
        extraction,
        consolidation,
    })
}
