///
/// This module implements the CLI interface for cycle-hire: command parsing, mapping
/// flags onto the core configuration, and printing run summaries.
///
/// All pipeline logic lives in the [`cycle-hire-core`] crate. This module is strictly
/// CLI glue.
///
/// ## Subcommands
/// - `download`: list the configured public buckets and fetch new trip-data files.
/// - `extract`: extract every archive under a directory and flatten its CSV files.
///
/// Both run without flags using the built-in defaults; flags override the config file.
///
/// [`cycle-hire-core`]: ../../cycle-hire-core/
use crate::load_config::load_optional_config;
use crate::summary::{download_summary, extract_summary};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use cycle_hire_core::config::{DownloadConfig, ExtractConfig, NestedArchivePolicy};
use cycle_hire_core::pipeline::{
    run_download_phase, run_extract_phase, DownloadPhaseReport, ExtractPhaseReport,
};
use cycle_hire_core::s3::{S3ObjectStore, S3Settings};
use std::env;
use std::path::PathBuf;

/// Endpoint used when neither `--endpoint` nor the config file names one.
pub const ENDPOINT_ENV: &str = "CYCLE_HIRE_S3_ENDPOINT";

/// CLI for cycle-hire: fetch and unpack public cycle-hire trip data.
#[derive(Parser, Debug)]
#[clap(
    name = "cycle-hire",
    version,
    about = "Download public cycle-hire trip data and flatten it into a CSV corpus"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the configured buckets and download new trip-data files
    Download(DownloadArgs),
    /// Extract archives under a directory and move its CSV files to the top level
    Extract(ExtractArgs),
}

#[derive(Args, Debug, Default)]
pub struct DownloadArgs {
    /// Path to a YAML config file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Only process the named source (repeatable)
    #[clap(long = "source", value_name = "NAME")]
    pub sources: Vec<String>,

    /// Maximum number of files to download per source
    #[clap(long, conflicts_with = "no_limit")]
    pub limit: Option<usize>,

    /// Download every matching file
    #[clap(long)]
    pub no_limit: bool,

    /// S3-compatible endpoint to use instead of AWS [fallback env: CYCLE_HIRE_S3_ENDPOINT]
    #[clap(long)]
    pub endpoint: Option<String>,

    /// Print the full report as JSON instead of a summary
    #[clap(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct ExtractArgs {
    /// Path to a YAML config file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Directory to extract and consolidate
    #[clap(long)]
    pub dir: Option<PathBuf>,

    /// How archives produced by extraction are handled
    #[clap(long, value_enum)]
    pub nested: Option<NestedMode>,

    /// Delete each archive after it was extracted successfully
    #[clap(long)]
    pub delete_archives: bool,

    /// Print the full report as JSON instead of a summary
    #[clap(long)]
    pub json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum NestedMode {
    /// Walk the tree once
    SinglePass,
    /// Re-walk until no new archive appears
    FixedPoint,
}

impl From<NestedMode> for NestedArchivePolicy {
    fn from(mode: NestedMode) -> Self {
        match mode {
            NestedMode::SinglePass => NestedArchivePolicy::SinglePass,
            NestedMode::FixedPoint => NestedArchivePolicy::FixedPoint,
        }
    }
}

impl DownloadArgs {
    /// Config file (or defaults) with the flags applied on top.
    ///
    /// Endpoint precedence: `--endpoint`, then the config file, then [`ENDPOINT_ENV`].
    pub fn resolve(&self) -> Result<DownloadConfig> {
        let mut config = load_optional_config(self.config.as_deref())?.download_config();
        if self.no_limit {
            config.policy.max_files = None;
        } else if let Some(limit) = self.limit {
            config.policy.max_files = Some(limit);
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        } else if config.endpoint.is_none() {
            config.endpoint = env::var(ENDPOINT_ENV).ok().filter(|e| !e.is_empty());
        }
        let config = config.select_sources(&self.sources)?;
        Ok(config)
    }
}

impl ExtractArgs {
    pub fn resolve(&self) -> Result<ExtractConfig> {
        let mut config = load_optional_config(self.config.as_deref())?.extract_config();
        if let Some(dir) = &self.dir {
            config.directory = dir.clone();
        }
        if let Some(nested) = self.nested {
            config.nested = nested.into();
        }
        if self.delete_archives {
            config.delete_archives = true;
        }
        Ok(config)
    }
}

/// Phase 1: list and fetch every selected source.
pub async fn download(args: &DownloadArgs) -> Result<DownloadPhaseReport> {
    let config = args.resolve()?;
    config.trace_loaded();

    let settings = S3Settings {
        endpoint: config.endpoint.clone(),
        default_region: None,
    };
    let store = S3ObjectStore::connect(settings, &config.sources).await;
    let report = run_download_phase(&config, &store)
        .await
        .context("Download phase failed")?;
    Ok(report)
}

/// Phase 2: extract and consolidate one directory.
pub async fn extract(args: &ExtractArgs) -> Result<ExtractPhaseReport> {
    let config = args.resolve()?;
    config.trace_loaded();

    let report = tokio::task::spawn_blocking(move || run_extract_phase(&config))
        .await
        .context("Extract phase panicked")?
        .context("Extract phase failed")?;
    Ok(report)
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Download(args) => {
            tracing::info!(command = "download", "Starting download phase");
            let report = download(&args).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", download_summary(&report));
            }
            tracing::info!(command = "download", "Download complete");
        }
        Commands::Extract(args) => {
            tracing::info!(command = "extract", "Starting extract phase");
            let report = extract(&args).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", extract_summary(&report));
            }
            tracing::info!(command = "extract", "Extract complete");
        }
    }
    Ok(())
}
