//! JSON results file and the end-of-run console summary.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context;
use breakthrough_core::{OutputConfig, RunSummary, ValidatedRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::collect::RunResult;

const RULE: &str = "==================================================";

#[derive(Serialize)]
struct ResultsDocument<'a> {
    generated_at: DateTime<Utc>,
    summaries: Vec<&'a RunSummary>,
    records: Vec<&'a ValidatedRecord>,
}

/// `{directory}/{filename_template}` with `{timestamp}` rendered as
/// `YYYYMMDD_HHMMSS`.
pub(crate) fn output_path(config: &OutputConfig, now: DateTime<Utc>) -> PathBuf {
    let stamp = now.format("%Y%m%d_%H%M%S").to_string();
    Path::new(&config.directory).join(config.filename_template.replace("{timestamp}", &stamp))
}

/// Writes every run's summary and records to one JSON file.
///
/// # Errors
///
/// Returns an error if the output directory cannot be created or the file
/// cannot be written.
pub(crate) fn write_results(
    config: &OutputConfig,
    results: &[RunResult],
    now: DateTime<Utc>,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("failed to create output directory {}", config.directory))?;

    let path = output_path(config, now);
    let document = ResultsDocument {
        generated_at: now,
        summaries: results.iter().map(|r| &r.summary).collect(),
        records: results.iter().flat_map(|r| &r.records).collect(),
    };

    let file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &document)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;

    Ok(path)
}

/// Console banner summarising all runs.
pub(crate) fn render_summary(results: &[RunResult], path: &Path, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let total: usize = results.iter().map(|r| r.summary.records_total).sum();
    let invalid: usize = results.iter().map(|r| r.summary.records_invalid).sum();
    let dropped: u32 = results
        .iter()
        .map(|r| r.summary.items_dropped_malformed)
        .sum();

    let _ = writeln!(out, "\n{RULE}");
    let _ = writeln!(out, "BREAKTHROUGH SCRAPER SUMMARY");
    let _ = writeln!(out, "{RULE}");
    for result in results {
        let s = &result.summary;
        let _ = writeln!(
            out,
            "{}/{}: {} ({} pages, {} records, {} invalid, {} dropped)",
            s.location,
            s.product_type,
            s.outcome,
            s.pages_fetched,
            s.records_total,
            s.records_invalid,
            s.items_dropped_malformed
        );
        if let Some(cause) = &s.cause {
            let _ = writeln!(out, "  cause: {cause}");
        }
    }
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Records scraped: {total}");
    let _ = writeln!(out, "Records valid: {}", total.saturating_sub(invalid));
    let _ = writeln!(out, "Items dropped: {dropped}");
    let _ = writeln!(out, "Output file: {}", path.display());
    let _ = writeln!(out, "Finished at: {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = write!(out, "{RULE}");
    out
}
