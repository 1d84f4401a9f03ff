//! Observable pipeline progress.
//!
//! The pipeline reports every state transition and notable per-page or
//! per-item outcome to an [`EventSink`]. [`TracingSink`] turns them into
//! structured `tracing` events; callers that need to react (progress bars,
//! tests) can supply their own sink.

use breakthrough_core::{RunSummary, ScrapeRequest};

use crate::error::ScraperError;
use crate::pipeline::PipelineState;

#[derive(Debug)]
pub enum PipelineEvent<'a> {
    StateChanged {
        from: PipelineState,
        to: PipelineState,
    },
    PageFetched {
        page_index: u32,
        items: usize,
        has_next_page: bool,
    },
    /// Pagination ended early; the run keeps what it already has.
    PaginationStopped {
        pages_fetched: u32,
        error: &'a ScraperError,
    },
    ItemDropped {
        page_index: u32,
        error: &'a ScraperError,
    },
    RecordInvalid {
        id: &'a str,
        violations: &'a [String],
    },
    Finished {
        summary: &'a RunSummary,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, request: &ScrapeRequest, event: &PipelineEvent<'_>);
}

/// Default sink: one `tracing` event per pipeline event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, request: &ScrapeRequest, event: &PipelineEvent<'_>) {
        let location = request.location();
        let product_type = request.product_type();
        match event {
            PipelineEvent::StateChanged { from, to } => {
                tracing::debug!(location, product_type, %from, %to, "pipeline state changed");
            }
            PipelineEvent::PageFetched {
                page_index,
                items,
                has_next_page,
            } => {
                tracing::info!(
                    location,
                    product_type,
                    page = page_index,
                    items,
                    has_next_page,
                    "page fetched"
                );
            }
            PipelineEvent::PaginationStopped {
                pages_fetched,
                error,
            } => {
                tracing::warn!(
                    location,
                    product_type,
                    pages_fetched,
                    error = %error,
                    "pagination stopped early"
                );
            }
            PipelineEvent::ItemDropped { page_index, error } => {
                tracing::warn!(
                    location,
                    product_type,
                    page = page_index,
                    error = %error,
                    "dropping malformed item"
                );
            }
            PipelineEvent::RecordInvalid { id, violations } => {
                tracing::debug!(
                    location,
                    product_type,
                    id,
                    violations = %violations.join(","),
                    "record failed validation"
                );
            }
            PipelineEvent::Finished { summary } => {
                tracing::info!(
                    location,
                    product_type,
                    outcome = %summary.outcome,
                    pages = summary.pages_fetched,
                    records = summary.records_total,
                    invalid = summary.records_invalid,
                    dropped = summary.items_dropped_malformed,
                    "scrape finished"
                );
            }
        }
    }
}
