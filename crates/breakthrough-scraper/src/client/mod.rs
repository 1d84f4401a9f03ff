//! Single-request fetch client with timeout and bounded retry.

mod http;

use std::sync::Arc;
use std::time::Duration;

use breakthrough_core::ScraperConfig;
use futures::future::BoxFuture;

use crate::error::ScraperError;
use crate::rate_limit::{retry_with_backoff, RateLimiter, RetryPolicy};

pub use http::HttpTransport;

/// A completed HTTP exchange, before any status interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one outbound GET.
///
/// Implementations return `Ok` for any HTTP status and reserve `Err` for
/// transport-level failures ([`ScraperError::Timeout`],
/// [`ScraperError::Connection`]); [`FetchClient`] decides what a status means.
pub trait Transport: Send + Sync {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<RawResponse, ScraperError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<RawResponse, ScraperError>> {
        (**self).get(url)
    }
}

/// Fetch client for catalog pages.
///
/// Every attempt is bounded by the configured timeout. Transient failures
/// (timeouts, connection errors, HTTP 429/500/502/503/504) are retried up to
/// `max_retries` times, waiting on the shared [`RateLimiter`] with exponential
/// backoff before each retry. Other HTTP error statuses are returned at once.
pub struct FetchClient<T = HttpTransport> {
    transport: T,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl FetchClient<HttpTransport> {
    /// Builds a reqwest-backed client from the scraper configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ClientBuild`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn from_config(
        config: &ScraperConfig,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, ScraperError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(
            transport,
            limiter,
            RetryPolicy::from_config(config),
            config.timeout_duration(),
        ))
    }
}

impl<T: Transport> FetchClient<T> {
    pub fn new(
        transport: T,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            limiter,
            policy,
            timeout,
        }
    }

    /// The limiter this client waits on between retries.
    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Fetches `url`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::HttpStatus`] for a non-retryable error status (not retried).
    /// - [`ScraperError::FetchExhausted`] once retries run out, wrapping the
    ///   last [`ScraperError::Timeout`], [`ScraperError::Connection`], or
    ///   retryable [`ScraperError::HttpStatus`].
    pub async fn fetch(&self, url: &str) -> Result<RawResponse, ScraperError> {
        retry_with_backoff(&self.limiter, self.policy, url, || self.fetch_once(url)).await
    }

    async fn fetch_once(&self, url: &str) -> Result<RawResponse, ScraperError> {
        let response = tokio::time::timeout(self.timeout, self.transport.get(url))
            .await
            .map_err(|_| ScraperError::Timeout {
                url: url.to_owned(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        if !response.is_success() {
            return Err(ScraperError::HttpStatus {
                status: response.status,
                url: url.to_owned(),
            });
        }

        tracing::debug!(url, status = response.status, bytes = response.body.len(), "fetched");
        Ok(response)
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
