//! One scrape run: fetch → normalize → validate.
//!
//! A [`Pipeline`] is single-use. [`Pipeline::run`] consumes it and walks
//!
//! ```text
//! Idle → Fetching → Normalizing → Validating → Done
//!   └──────┴────────────┴─────────────┴──────→ Failed
//! ```
//!
//! Early termination of pagination (exhausted retries, a bad page,
//! cancellation) is not a failure once at least one page arrived: the
//! pipeline keeps going with what it has and reports a `partial` outcome.
//! Only a run that cannot fetch its first page, or whose configuration is
//! invalid, fails.

use std::fmt;
use std::sync::Arc;

use breakthrough_core::{
    AppConfig, ConfigError, RunOutcome, RunSummary, ScrapeRequest, ScraperConfig,
    ValidatedRecord, ValidationConfig,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::cancel::CancelSignal;
use crate::client::{FetchClient, HttpTransport, Transport};
use crate::error::ScraperError;
use crate::events::{EventSink, PipelineEvent, TracingSink};
use crate::normalize::Normalizer;
use crate::pagination::Paginator;
use crate::parse::{JsonPageParser, PageParser, RawItem};
use crate::rate_limit::RateLimiter;
use crate::validate::Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    Normalizing,
    Validating,
    Done,
    Failed,
}

impl PipelineState {
    /// Whether `self → next` is an edge of the run state machine.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Fetching)
                | (Self::Fetching, Self::Normalizing)
                | (Self::Normalizing, Self::Validating)
                | (Self::Validating, Self::Done)
                | (
                    Self::Idle | Self::Fetching | Self::Normalizing | Self::Validating,
                    Self::Failed
                )
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Validating => "validating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Where a failed run gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Fetching,
    Normalizing,
    Validating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Validating => "validating",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FailureCause {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scraper(#[from] ScraperError),
}

/// A run that produced no usable output.
#[derive(Debug, Error)]
#[error("scrape failed during {stage} after {pages_fetched} pages")]
pub struct PipelineError {
    pub stage: Stage,
    pub pages_fetched: u32,
    #[source]
    pub source: FailureCause,
}

impl PipelineError {
    fn new(stage: Stage, pages_fetched: u32, source: impl Into<FailureCause>) -> Self {
        Self {
            stage,
            pages_fetched,
            source: source.into(),
        }
    }

    /// Summary row for reporting this failure next to successful runs.
    #[must_use]
    pub fn failed_summary(
        &self,
        request: &ScrapeRequest,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> RunSummary {
        RunSummary {
            location: request.location().to_string(),
            product_type: request.product_type().to_string(),
            pages_fetched: self.pages_fetched,
            items_dropped_malformed: 0,
            records_total: 0,
            records_invalid: 0,
            outcome: RunOutcome::Failed,
            cause: Some(format!("{self}: {}", self.source)),
            started_at,
            finished_at,
        }
    }
}

/// Records in source order plus the run summary.
#[derive(Debug)]
pub struct RunReport {
    pub records: Vec<ValidatedRecord>,
    pub summary: RunSummary,
}

pub struct Pipeline<T: Transport = HttpTransport> {
    scraper: ScraperConfig,
    validation: ValidationConfig,
    client: FetchClient<T>,
    parser: Box<dyn PageParser>,
    normalizer: Normalizer,
    validator: Validator,
    sink: Arc<dyn EventSink>,
    cancel: CancelSignal,
    state: PipelineState,
}

impl Pipeline<HttpTransport> {
    /// Builds a reqwest-backed pipeline with its own rate limiter. Pipelines
    /// built this way share nothing but the configuration they were cloned
    /// from.
    ///
    /// # Errors
    ///
    /// Returns a [`Stage::Config`] error if the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        config
            .validate()
            .map_err(|e| PipelineError::new(Stage::Config, 0, e))?;
        let limiter = Arc::new(RateLimiter::new(config.scraper.delay_range));
        let client = FetchClient::from_config(&config.scraper, limiter)
            .map_err(|e| PipelineError::new(Stage::Config, 0, e))?;
        Ok(Self::with_client(config, client))
    }
}

impl<T: Transport> Pipeline<T> {
    /// Builds a pipeline around an existing fetch client, with the JSON page
    /// parser, a wall-clock normalizer, the configured validator, and a
    /// [`TracingSink`].
    pub fn with_client(config: &AppConfig, client: FetchClient<T>) -> Self {
        Self {
            scraper: config.scraper.clone(),
            validation: config.validation.clone(),
            client,
            parser: Box::new(JsonPageParser::from_config(&config.scraper)),
            normalizer: Normalizer::default(),
            validator: Validator::from_config(&config.validation),
            sink: Arc::new(TracingSink),
            cancel: CancelSignal::never(),
            state: PipelineState::Idle,
        }
    }

    #[must_use]
    pub fn with_parser(mut self, parser: impl PageParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        self.client.limiter()
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Runs the scrape for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the configuration is invalid
    /// ([`Stage::Config`]), if the first page cannot be fetched
    /// ([`Stage::Fetching`]), or if normalization hits a non-item error
    /// ([`Stage::Normalizing`]). Cancellation never fails a run; it yields
    /// a `partial` report with whatever was fetched.
    pub async fn run(mut self, request: &ScrapeRequest) -> Result<RunReport, PipelineError> {
        let started_at = self.normalizer.now();

        if let Err(e) = self.scraper.validate().and_then(|()| self.validation.validate()) {
            self.transition(request, PipelineState::Failed);
            return Err(PipelineError::new(Stage::Config, 0, e));
        }

        self.transition(request, PipelineState::Fetching);
        let (raw_items, pages_fetched, stopped) = self.fetch_all(request).await;

        if let Some(err) = &stopped {
            self.sink.emit(
                request,
                &PipelineEvent::PaginationStopped {
                    pages_fetched,
                    error: err,
                },
            );
        }
        let stopped = match stopped {
            Some(err) if pages_fetched == 0 && !matches!(err, ScraperError::Cancelled) => {
                self.transition(request, PipelineState::Failed);
                return Err(PipelineError::new(Stage::Fetching, 0, err));
            }
            other => other,
        };

        self.transition(request, PipelineState::Normalizing);
        let mut records = Vec::with_capacity(raw_items.len());
        let mut dropped: u32 = 0;
        for (page_index, item) in &raw_items {
            match self.normalizer.normalize(item, request.location(), *page_index) {
                Ok(record) => records.push(record),
                Err(err @ ScraperError::MalformedItem { .. }) => {
                    dropped += 1;
                    self.sink.emit(
                        request,
                        &PipelineEvent::ItemDropped {
                            page_index: *page_index,
                            error: &err,
                        },
                    );
                }
                Err(err) => {
                    self.transition(request, PipelineState::Failed);
                    return Err(PipelineError::new(Stage::Normalizing, pages_fetched, err));
                }
            }
        }

        self.transition(request, PipelineState::Validating);
        let records = self.validator.validate_batch(records);
        let mut records_invalid = 0;
        for validated in records.iter().filter(|v| !v.validation.is_valid()) {
            records_invalid += 1;
            self.sink.emit(
                request,
                &PipelineEvent::RecordInvalid {
                    id: &validated.record.id,
                    violations: &validated.validation.violations,
                },
            );
        }

        self.transition(request, PipelineState::Done);
        let summary = RunSummary {
            location: request.location().to_string(),
            product_type: request.product_type().to_string(),
            pages_fetched,
            items_dropped_malformed: dropped,
            records_total: records.len(),
            records_invalid,
            outcome: if stopped.is_some() {
                RunOutcome::Partial
            } else {
                RunOutcome::Done
            },
            cause: stopped.map(|err| err.to_string()),
            started_at,
            finished_at: self.normalizer.now(),
        };
        self.sink
            .emit(request, &PipelineEvent::Finished { summary: &summary });

        Ok(RunReport { records, summary })
    }

    /// Drains the paginator, keeping each raw item with its page index.
    async fn fetch_all(
        &self,
        request: &ScrapeRequest,
    ) -> (Vec<(u32, RawItem)>, u32, Option<ScraperError>) {
        let mut paginator = Paginator::new(
            &self.client,
            self.parser.as_ref(),
            &self.scraper,
            request,
            self.cancel.clone(),
        );

        let mut raw_items = Vec::new();
        let mut stopped = None;
        while let Some(next) = paginator.next_page().await {
            match next {
                Ok(page) => {
                    self.sink.emit(
                        request,
                        &PipelineEvent::PageFetched {
                            page_index: page.page_index,
                            items: page.items.len(),
                            has_next_page: page.has_next_page,
                        },
                    );
                    let page_index = page.page_index;
                    raw_items.extend(page.items.into_iter().map(|item| (page_index, item)));
                }
                Err(err) => stopped = Some(err),
            }
        }

        (raw_items, paginator.pages_completed(), stopped)
    }

    fn transition(&mut self, request: &ScrapeRequest, next: PipelineState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal pipeline transition {} -> {next}",
            self.state
        );
        let from = self.state;
        self.state = next;
        self.sink
            .emit(request, &PipelineEvent::StateChanged { from, to: next });
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
