use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_MAX_FILES: usize = 50_000;
pub const DEFAULT_EXTENSIONS: [&str; 2] = [".csv", ".zip"];
pub const DEFAULT_EXCLUDE_PREFIX: &str = "JC-";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_EXTRACT_DIR: &str = "citibike_trip_data";

/// One public bucket and the local directory its objects land in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSource {
    /// Logical name used for source selection and reporting (e.g. `NYC_CitiBike`).
    pub name: String,
    pub bucket: String,
    pub directory: PathBuf,
    /// Bucket region; [`DEFAULT_REGION`] when absent.
    #[serde(default)]
    pub region: Option<String>,
}

impl BucketSource {
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn trace_loaded(&self) {
        info!(
            source = %self.name,
            bucket = %self.bucket,
            directory = %self.directory.display(),
            region = self.region(),
            "Loaded bucket source"
        );
    }
}

/// What counts as "already fetched" for an object whose local file exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
    /// Any file at the local path counts, whatever its content.
    #[default]
    Exists,
    /// The local file must also have the listed size, otherwise it is fetched again.
    SizeMatches,
}

/// Filter, ordering cap and skip rules shared by every source of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchPolicy {
    /// Allowed key suffixes, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Objects must be strictly larger than this many bytes.
    pub min_size: u64,
    /// Keys starting with this prefix (case-insensitive) are never fetched.
    pub exclude_prefix: Option<String>,
    /// Successful downloads per source; `None` means no limit.
    pub max_files: Option<usize>,
    pub skip_policy: SkipPolicy,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            min_size: 0,
            exclude_prefix: Some(DEFAULT_EXCLUDE_PREFIX.to_string()),
            max_files: Some(DEFAULT_MAX_FILES),
            skip_policy: SkipPolicy::Exists,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown source '{0}' (known sources: {1})")]
    UnknownSource(String, String),
}

/// Phase 1 configuration: which buckets to fetch and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub sources: Vec<BucketSource>,
    pub policy: FetchPolicy,
    /// S3-compatible endpoint override (local test servers, mirrors).
    pub endpoint: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            policy: FetchPolicy::default(),
            endpoint: None,
        }
    }
}

impl DownloadConfig {
    /// Restricts the run to the named sources. An empty selection keeps all of them.
    pub fn select_sources(mut self, names: &[String]) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Ok(self);
        }
        for name in names {
            if !self.sources.iter().any(|s| &s.name == name) {
                let known = self
                    .sources
                    .iter()
                    .map(|s| s.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ConfigError::UnknownSource(name.clone(), known));
            }
        }
        self.sources.retain(|s| names.contains(&s.name));
        Ok(self)
    }

    pub fn trace_loaded(&self) {
        info!(
            sources_count = self.sources.len(),
            max_files = ?self.policy.max_files,
            extensions = ?self.policy.extensions,
            exclude_prefix = ?self.policy.exclude_prefix,
            "Loaded download config"
        );
        for source in &self.sources {
            source.trace_loaded();
        }
        debug!(?self, "Download config loaded (full debug)");
    }
}

/// Whether archives produced by an extraction are themselves extracted in the same run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedArchivePolicy {
    /// Enumerate the tree once; archives that appear during extraction are left for the next run.
    #[default]
    SinglePass,
    /// Re-walk until no unprocessed archive is left.
    FixedPoint,
}

/// Phase 2 configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractConfig {
    pub directory: PathBuf,
    pub nested: NestedArchivePolicy,
    /// Remove each archive after it was extracted without error.
    pub delete_archives: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_EXTRACT_DIR),
            nested: NestedArchivePolicy::SinglePass,
            delete_archives: false,
        }
    }
}

impl ExtractConfig {
    pub fn trace_loaded(&self) {
        info!(
            directory = %self.directory.display(),
            nested = ?self.nested,
            delete_archives = self.delete_archives,
            "Loaded extract config"
        );
    }
}

/// The two public trip-data buckets the pipeline was built for.
pub fn default_sources() -> Vec<BucketSource> {
    vec![
        BucketSource {
            name: "TfL_Cycling".to_string(),
            bucket: "cycling.data.tfl.gov.uk".to_string(),
            directory: PathBuf::from("tfl_cycling_data"),
            region: Some("eu-west-1".to_string()),
        },
        BucketSource {
            name: "NYC_CitiBike".to_string(),
            bucket: "tripdata".to_string(),
            directory: PathBuf::from("citibike_trip_data"),
            region: Some(DEFAULT_REGION.to_string()),
        },
    ]
}
