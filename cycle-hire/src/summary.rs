//! Human-readable run summaries printed on stdout.

use std::fmt::Write;

use cycle_hire_core::pipeline::{DownloadPhaseReport, ExtractPhaseReport};

pub fn download_summary(report: &DownloadPhaseReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Download summary:");
    for source in &report.sources {
        match (&source.listing_error, &source.fetch) {
            (Some(err), _) => {
                let _ = writeln!(
                    out,
                    "  {} ({}): listing failed: {}",
                    source.source, source.bucket, err
                );
            }
            (None, Some(fetch)) => {
                let _ = writeln!(
                    out,
                    "  {} ({}): listed {}, matched {}, downloaded {}, skipped {}, failed {}{}",
                    source.source,
                    source.bucket,
                    fetch.listed,
                    fetch.matched,
                    fetch.downloaded.len(),
                    fetch.skipped,
                    fetch.failures.len(),
                    if fetch.limit_reached { " (limit reached)" } else { "" }
                );
                for failure in &fetch.failures {
                    let _ = writeln!(out, "    failed: {} ({})", failure.key, failure.cause);
                }
            }
            (None, None) => {}
        }
    }
    let _ = writeln!(
        out,
        "Total: listed {}, downloaded {}, skipped {}, failed {}, sources failed {}",
        report.listed(),
        report.downloaded(),
        report.skipped(),
        report.failed_downloads(),
        report.listing_failures()
    );
    out
}

pub fn extract_summary(report: &ExtractPhaseReport) -> String {
    let mut out = String::new();
    let extraction = &report.extraction;
    let consolidation = &report.consolidation;
    let _ = writeln!(out, "Extract summary for {}:", report.root.display());
    let _ = writeln!(
        out,
        "  archives found {}, extracted {}, corrupt {}, failed {}",
        extraction.found,
        extraction.extracted(),
        extraction.corrupt(),
        extraction.failed()
    );
    for result in &extraction.results {
        if let Err(e) = &result.outcome {
            let _ = writeln!(out, "    {e}");
        }
    }
    let _ = writeln!(
        out,
        "  CSV files found {}, moved {}, failed {}",
        consolidation.found,
        consolidation.moved.len(),
        consolidation.failures.len()
    );
    for failure in &consolidation.failures {
        let _ = writeln!(out, "    {failure}");
    }
    out
}
