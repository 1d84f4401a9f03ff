pub mod cancel;
pub mod client;
pub mod error;
pub mod events;
pub mod normalize;
pub mod pagination;
pub mod parse;
pub mod pipeline;
pub mod rate_limit;
pub mod time;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use client::{FetchClient, HttpTransport, RawResponse, Transport};
pub use error::ScraperError;
pub use events::{EventSink, PipelineEvent, TracingSink};
pub use normalize::{parse_price, Normalizer};
pub use pagination::{page_url, Paginator};
pub use parse::{JsonPageParser, PageParser, PageResult, RawItem};
pub use pipeline::{FailureCause, Pipeline, PipelineError, PipelineState, RunReport, Stage};
pub use rate_limit::{retry_with_backoff, RateLimiter, RetryPolicy};
pub use validate::{RecordRule, Validator};
