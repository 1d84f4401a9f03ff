//! reqwest-backed [`Transport`].

use std::time::Duration;

use breakthrough_core::ScraperConfig;
use futures::future::BoxFuture;
use reqwest::Client;

use super::{RawResponse, Transport};
use crate::error::ScraperError;

const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport with the configured timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ClientBuild`] if the underlying
    /// `reqwest::Client` cannot be constructed (e.g., invalid TLS config).
    pub fn new(config: &ScraperConfig) -> Result<Self, ScraperError> {
        let timeout = config.timeout_duration();
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, url: &str, err: &reqwest::Error) -> ScraperError {
        if err.is_timeout() {
            ScraperError::Timeout {
                url: url.to_owned(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            ScraperError::Connection {
                url: url.to_owned(),
                reason: err.to_string(),
            }
        }
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<RawResponse, ScraperError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .header(
                    reqwest::header::ACCEPT,
                    "application/json,text/html;q=0.9,*/*;q=0.8",
                )
                .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
                .header(reqwest::header::CACHE_CONTROL, "no-cache")
                .send()
                .await
                .map_err(|e| self.classify(url, &e))?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| self.classify(url, &e))?;

            Ok(RawResponse {
                url: url.to_owned(),
                status,
                body,
            })
        })
    }
}
