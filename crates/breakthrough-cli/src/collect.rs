//! Runs one pipeline per (location, product type) pair through a bounded
//! worker pool.
//!
//! Each pipeline paces its own requests with its own rate limiter; runs
//! share only the immutable configuration and the cancellation signal. A run
//! that fails is reported in the results rather than aborting the others.

use anyhow::Context;
use breakthrough_core::{AppConfig, RunSummary, ScrapeRequest, ValidatedRecord};
use breakthrough_scraper::{CancelSignal, Pipeline};
use chrono::Utc;
use futures::stream::{self, StreamExt};

/// What one scrape run left behind.
#[derive(Debug)]
pub(crate) struct RunResult {
    pub summary: RunSummary,
    pub records: Vec<ValidatedRecord>,
}

/// Cross product of `locations` × `product_types`, skipping repeats.
///
/// # Errors
///
/// Returns an error if any pair does not form a valid [`ScrapeRequest`].
pub(crate) fn build_requests(
    locations: &[String],
    product_types: &[String],
    max_pages: u32,
) -> anyhow::Result<Vec<ScrapeRequest>> {
    let mut requests: Vec<ScrapeRequest> = Vec::new();
    for location in locations {
        for product_type in product_types {
            let request = ScrapeRequest::new(location.as_str(), product_type.as_str(), max_pages)
                .with_context(|| format!("invalid scrape target {location}/{product_type}"))?;
            if !requests.contains(&request) {
                requests.push(request);
            }
        }
    }
    Ok(requests)
}

/// Runs every request, at most `concurrency` at a time, and returns results
/// in request order.
///
/// # Errors
///
/// Returns an error only if the configuration is invalid; individual run
/// failures are captured in their [`RunResult`].
pub(crate) async fn run_all(
    config: &AppConfig,
    requests: Vec<ScrapeRequest>,
    cancel: CancelSignal,
    concurrency: usize,
) -> anyhow::Result<Vec<RunResult>> {
    config.validate().context("invalid configuration")?;

    let mut results: Vec<(usize, RunResult)> = stream::iter(requests.into_iter().enumerate())
        .map(|(idx, request)| {
            let cancel = cancel.clone();
            async move { (idx, run_one(config, &request, cancel).await) }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(idx, _)| *idx);
    Ok(results.into_iter().map(|(_, result)| result).collect())
}

async fn run_one(
    config: &AppConfig,
    request: &ScrapeRequest,
    cancel: CancelSignal,
) -> RunResult {
    let started_at = Utc::now();
    let outcome = match Pipeline::from_config(config) {
        Ok(pipeline) => pipeline.with_cancel(cancel).run(request).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(report) => RunResult {
            summary: report.summary,
            records: report.records,
        },
        Err(err) => {
            tracing::error!(
                location = request.location(),
                product_type = request.product_type(),
                error = %err,
                "scrape run failed"
            );
            RunResult {
                summary: err.failed_summary(request, started_at, Utc::now()),
                records: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
#[path = "collect_test.rs"]
mod tests;
