/// `load_config` module: reads the optional static YAML config and maps it onto the core
/// [`DownloadConfig`] and [`ExtractConfig`].
///
/// Every key is optional. Whatever the file leaves out falls back to the built-in
/// defaults of `cycle-hire-core`, so running without any config file reproduces the
/// reference setup (TfL and Citi Bike buckets, 50000-file cap, `.csv`/`.zip`).
///
/// # Errors
/// Unreadable files and invalid YAML are reported as `anyhow::Error` with the path in
/// the message, and surface at the CLI boundary.
use anyhow::Result;
use cycle_hire_core::config::{
    BucketSource, DownloadConfig, ExtractConfig, NestedArchivePolicy, SkipPolicy,
};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub download: DownloadSection,
    pub extract: ExtractSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadSection {
    /// Absent: default cap. `null`: unlimited.
    #[serde(deserialize_with = "present_or_null")]
    pub max_files: Option<Option<usize>>,
    pub extensions: Option<Vec<String>>,
    #[serde(deserialize_with = "present_or_null")]
    pub exclude_prefix: Option<Option<String>>,
    pub min_size: Option<u64>,
    pub skip_policy: Option<SkipPolicy>,
    pub endpoint: Option<String>,
    pub sources: Option<Vec<BucketSource>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractSection {
    pub directory: Option<PathBuf>,
    pub nested: Option<NestedArchivePolicy>,
    pub delete_archives: Option<bool>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from a missing key (`None`).
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

impl CliConfig {
    pub fn download_config(&self) -> DownloadConfig {
        let mut config = DownloadConfig::default();
        let section = &self.download;
        if let Some(max_files) = section.max_files {
            config.policy.max_files = max_files;
        }
        if let Some(extensions) = &section.extensions {
            config.policy.extensions = extensions.clone();
        }
        if let Some(prefix) = &section.exclude_prefix {
            config.policy.exclude_prefix = prefix.clone();
        }
        if let Some(min_size) = section.min_size {
            config.policy.min_size = min_size;
        }
        if let Some(skip_policy) = section.skip_policy {
            config.policy.skip_policy = skip_policy;
        }
        if let Some(sources) = &section.sources {
            config.sources = sources.clone();
        }
        config.endpoint = section.endpoint.clone();
        config
    }

    pub fn extract_config(&self) -> ExtractConfig {
        let mut config = ExtractConfig::default();
        let section = &self.extract;
        if let Some(directory) = &section.directory {
            config.directory = directory.clone();
        }
        if let Some(nested) = section.nested {
            config.nested = nested;
        }
        if let Some(delete_archives) = section.delete_archives {
            config.delete_archives = delete_archives;
        }
        config
    }
}

/// Loads a static YAML config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    if config_content.trim().is_empty() {
        info!(config_path = ?path_ref, "Config file is empty, using defaults");
        return Ok(CliConfig::default());
    }

    match serde_yaml::from_str::<CliConfig>(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML {:?}: {e}", path_ref))
        }
    }
}

/// Loads `path` when given, otherwise the built-in defaults.
pub fn load_optional_config(path: Option<&Path>) -> Result<CliConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            info!("No config file given, using built-in defaults");
            Ok(CliConfig::default())
        }
    }
}
