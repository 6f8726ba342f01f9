//! Error types for both pipeline phases.
//!
//! Per-item failures ([`DownloadFailure`], [`ExtractError`], [`MoveFailure`]) are
//! collected into reports and never stop a run. [`FetchError`] and [`PhaseError`]
//! are the only errors that end a phase early.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Failure of a single call against the object store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("response body stream failed: {0}")]
    Stream(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bucket could not be listed. The source is skipped, other sources still run.
#[derive(Debug, Error)]
#[error("listing bucket '{bucket}' failed: {source}")]
pub struct ListingError {
    pub bucket: String,
    #[source]
    pub source: StoreError,
}

/// One object could not be downloaded.
#[derive(Debug, Clone, Serialize, Error)]
#[error("download of '{key}' from bucket '{bucket}' failed: {cause}")]
pub struct DownloadFailure {
    pub bucket: String,
    pub key: String,
    pub cause: String,
}

/// Ends the whole download phase. Sources after the failing one are not processed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot create target directory {path}: {source}")]
    TargetDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One archive could not be extracted. The walk continues with the next archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("corrupt archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("I/O error extracting {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, ExtractError::CorruptArchive { .. })
    }
}

/// One CSV could not be relocated; it stays where it was.
#[derive(Debug, Clone, Serialize, Error)]
#[error("moving {} to {} failed: {cause}", .path.display(), .target.display())]
pub struct MoveFailure {
    pub path: PathBuf,
    pub target: PathBuf,
    pub cause: String,
}

/// Conditions that terminate a whole phase.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("root directory {0} does not exist or is not a directory")]
    RootNotFound(PathBuf),

    #[error("walking {path} failed: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
