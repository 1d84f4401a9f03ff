use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("connection error for {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("gave up on {url} after {attempts} attempts: {source}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<ScraperError>,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected page shape for {context}: {reason}")]
    PageShape { context: String, reason: String },

    #[error("malformed item: {reason}")]
    MalformedItem { reason: String },

    #[error("invalid catalog URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("scrape cancelled")]
    Cancelled,
}

impl ScraperError {
    /// Returns `true` for transient failures the fetch client retries:
    /// timeouts, connection failures, and HTTP 429/500/502/503/504.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ScraperError::Timeout { .. } | ScraperError::Connection { .. } => true,
            ScraperError::HttpStatus { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}
