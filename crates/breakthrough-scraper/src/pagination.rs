//! Page-index pagination over the listings endpoint.
//!
//! Page URLs are a pure function of `(location, product_type, page_index)`:
//!
//! ```text
//! {base_url}{listings_path}?location=california&product_type=flower&page=3&page_size=100
//! ```
//!
//! The [`Paginator`] walks pages 1, 2, 3, ... and stops at the first of:
//! - the request's `max_pages` budget,
//! - a page whose `has_next_page` flag is `false` (that page is still yielded),
//! - a page with zero items (end of catalog; nothing is yielded for it),
//! - a fetch or parse error, or cancellation (yielded once as the final `Err`).

use breakthrough_core::{ScrapeRequest, ScraperConfig};
use futures::Stream;

use crate::cancel::CancelSignal;
use crate::client::{FetchClient, Transport};
use crate::error::ScraperError;
use crate::parse::{PageParser, PageResult};

/// Builds the listings URL for one page.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] if `base_url` + `listings_path` is
/// not a valid absolute URL.
pub fn page_url(
    config: &ScraperConfig,
    request: &ScrapeRequest,
    page_index: u32,
) -> Result<String, ScraperError> {
    let path = config.listings_path.trim_start_matches('/');
    let base = format!("{}/{path}", config.base_url.trim_end_matches('/'));
    let mut url = reqwest::Url::parse(&base).map_err(|e| ScraperError::InvalidUrl {
        url: base.clone(),
        reason: e.to_string(),
    })?;

    url.query_pairs_mut()
        .append_pair("location", request.location())
        .append_pair("product_type", request.product_type())
        .append_pair("page", &page_index.to_string())
        .append_pair("page_size", &config.page_size.to_string());

    Ok(url.to_string())
}

/// Lazy, finite sequence of catalog pages for one [`ScrapeRequest`].
pub struct Paginator<'a, T: Transport> {
    client: &'a FetchClient<T>,
    parser: &'a dyn PageParser,
    config: &'a ScraperConfig,
    request: &'a ScrapeRequest,
    cancel: CancelSignal,
    next_index: u32,
    pages_completed: u32,
    finished: bool,
}

impl<'a, T: Transport> Paginator<'a, T> {
    pub fn new(
        client: &'a FetchClient<T>,
        parser: &'a dyn PageParser,
        config: &'a ScraperConfig,
        request: &'a ScrapeRequest,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            client,
            parser,
            config,
            request,
            cancel,
            next_index: 1,
            pages_completed: 0,
            finished: false,
        }
    }

    /// Number of pages successfully yielded so far.
    #[must_use]
    pub fn pages_completed(&self) -> u32 {
        self.pages_completed
    }

    /// Fetches the next page.
    ///
    /// Returns `None` once the sequence has ended. An `Err` is yielded at
    /// most once and always ends the sequence.
    pub async fn next_page(&mut self) -> Option<Result<PageResult, ScraperError>> {
        if self.finished || self.next_index > self.request.max_pages() {
            self.finished = true;
            return None;
        }

        if self.cancel.is_cancelled() {
            self.finished = true;
            return Some(Err(ScraperError::Cancelled));
        }

        let page_index = self.next_index;
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ScraperError::Cancelled),
            result = self.fetch_page(page_index) => result,
        };

        match result {
            Err(err) => {
                self.finished = true;
                tracing::warn!(
                    page = page_index,
                    pages_completed = self.pages_completed,
                    error = %err,
                    "pagination stopped"
                );
                Some(Err(err))
            }
            Ok(page) if page.items.is_empty() => {
                self.finished = true;
                tracing::info!(page = page_index, "empty page; end of catalog");
                None
            }
            Ok(page) => {
                self.pages_completed += 1;
                self.next_index += 1;
                if !page.has_next_page {
                    self.finished = true;
                    tracing::info!(page = page_index, "last page reported by catalog");
                }
                Some(Ok(page))
            }
        }
    }

    async fn fetch_page(&self, page_index: u32) -> Result<PageResult, ScraperError> {
        let url = page_url(self.config, self.request, page_index)?;
        self.client.limiter().wait().await;
        let response = self.client.fetch(&url).await?;
        self.parser.parse(page_index, &response)
    }

    /// Adapts the paginator into a [`Stream`] of pages.
    pub fn into_stream(self) -> impl Stream<Item = Result<PageResult, ScraperError>> + 'a {
        futures::stream::unfold(self, |mut paginator| async move {
            let item = paginator.next_page().await?;
            Some((item, paginator))
        })
    }
}

#[cfg(test)]
#[path = "pagination_test.rs"]
mod tests;
