//! Fake transports and fixtures shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;

use breakthrough_core::ScrapeRequest;

use crate::client::{FetchClient, RawResponse, Transport};
use crate::error::ScraperError;
use crate::events::{EventSink, PipelineEvent};
use crate::rate_limit::{RateLimiter, RetryPolicy};
use crate::time::RecordingSleeper;

pub(crate) type Reply = Result<RawResponse, ScraperError>;

pub(crate) fn ok(url: &str, body: impl Into<String>) -> Reply {
    status(url, 200, body)
}

pub(crate) fn status(url: &str, status: u16, body: impl Into<String>) -> Reply {
    Ok(RawResponse {
        url: url.to_owned(),
        status,
        body: body.into(),
    })
}

pub(crate) fn connection_reset(url: &str) -> Reply {
    Err(ScraperError::Connection {
        url: url.to_owned(),
        reason: "connection reset by peer".to_owned(),
    })
}

/// Replays a fixed queue of replies regardless of URL.
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicU32,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Reply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| connection_reset(url));
        Box::pin(std::future::ready(reply))
    }
}

/// Answers by the `page` query parameter and remembers which pages were asked for.
pub(crate) struct PagedTransport {
    respond: Box<dyn Fn(u32, &str) -> Reply + Send + Sync>,
    requested: Mutex<Vec<u32>>,
}

impl PagedTransport {
    pub(crate) fn new(respond: impl Fn(u32, &str) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

impl Transport for PagedTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Reply> {
        let page = page_param(url);
        self.requested.lock().unwrap().push(page);
        Box::pin(std::future::ready((self.respond)(page, url)))
    }
}

fn page_param(url: &str) -> u32 {
    url.split(['?', '&'])
        .find_map(|pair| pair.strip_prefix("page="))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// A listings page in the default JSON shape with one item per id.
pub(crate) fn page_body(page: u32, ids: &[&str], has_next: bool) -> String {
    let listings: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "name": format!("Listing {id}"),
                "category": "Flower",
                "price": "$12.50",
                "page": page,
            })
        })
        .collect();
    json!({
        "data": { "listings": listings },
        "meta": { "has_next_page": has_next },
    })
    .to_string()
}

pub(crate) fn instant_limiter(sleeper: &RecordingSleeper) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::seeded((0.0, 0.0), 11, Arc::new(sleeper.clone())))
}

pub(crate) fn retry_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff_base: Duration::from_millis(100),
        backoff_cap: Duration::from_secs(1),
    }
}

pub(crate) fn fetch_client<T: Transport>(
    transport: T,
    max_retries: u32,
    sleeper: &RecordingSleeper,
) -> FetchClient<T> {
    FetchClient::new(
        transport,
        instant_limiter(sleeper),
        retry_policy(max_retries),
        Duration::from_secs(5),
    )
}

/// Sink that keeps a compact text trace of every event.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Just the state changes, as `"from->to"`.
    pub(crate) fn transitions(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("state:").map(str::to_owned))
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, _request: &ScrapeRequest, event: &PipelineEvent<'_>) {
        let line = match event {
            PipelineEvent::StateChanged { from, to } => format!("state:{from}->{to}"),
            PipelineEvent::PageFetched { page_index, items, .. } => {
                format!("page:{page_index}:{items}")
            }
            PipelineEvent::PaginationStopped { pages_fetched, .. } => {
                format!("stopped:{pages_fetched}")
            }
            PipelineEvent::ItemDropped { page_index, .. } => format!("dropped:{page_index}"),
            PipelineEvent::RecordInvalid { id, violations } => {
                format!("invalid:{id}:{}", violations.join(","))
            }
            PipelineEvent::Finished { summary } => format!("finished:{}", summary.outcome),
        };
        self.events.lock().unwrap().push(line);
    }
}
