use chrono::TimeZone;
use serde_json::json;

use super::*;
use crate::cancel::cancel_pair;
use crate::test_support::{
    fetch_client, ok, page_body, status, PagedTransport, RecordingSink, Reply,
};
use crate::time::{FixedClock, RecordingSleeper};

const HAPPY_PATH: [&str; 4] = [
    "idle->fetching",
    "fetching->normalizing",
    "normalizing->validating",
    "validating->done",
];

fn request(max_pages: u32) -> ScrapeRequest {
    ScrapeRequest::new("california", "flower", max_pages).unwrap()
}

fn run_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
}

struct Harness {
    pipeline: Pipeline<Arc<PagedTransport>>,
    transport: Arc<PagedTransport>,
    sink: Arc<RecordingSink>,
}

fn harness_with(
    config: &AppConfig,
    max_retries: u32,
    respond: impl Fn(u32, &str) -> Reply + Send + Sync + 'static,
) -> Harness {
    let transport = Arc::new(PagedTransport::new(respond));
    let client = fetch_client(Arc::clone(&transport), max_retries, &RecordingSleeper::new());
    let sink = Arc::new(RecordingSink::default());
    let pipeline = Pipeline::with_client(config, client)
        .with_normalizer(Normalizer::new(Arc::new(FixedClock(run_at()))))
        .with_sink(Arc::clone(&sink) as Arc<dyn EventSink>);
    Harness {
        pipeline,
        transport,
        sink,
    }
}

fn harness(
    max_retries: u32,
    respond: impl Fn(u32, &str) -> Reply + Send + Sync + 'static,
) -> Harness {
    harness_with(&AppConfig::default(), max_retries, respond)
}

#[tokio::test]
async fn completes_when_catalog_reports_last_page() {
    let h = harness(0, |page, url| {
        ok(url, page_body(
            page,
            &[format!("p{page}-a").as_str(), format!("p{page}-b").as_str()],
            page < 2,
        ))
    });
    assert_eq!(h.pipeline.state(), PipelineState::Idle);

    let report = h.pipeline.run(&request(10)).await.unwrap();
    assert_eq!(report.summary.outcome, RunOutcome::Done);
    assert_eq!(report.summary.pages_fetched, 2);
    assert_eq!(report.summary.records_total, 4);
    assert_eq!(report.summary.records_valid(), 4);
    assert!(report.summary.cause.is_none());
    assert_eq!(report.summary.started_at, run_at());
    assert_eq!(h.sink.transitions(), HAPPY_PATH);
    assert_eq!(h.sink.events().last().map(String::as_str), Some("finished:done"));
}

#[tokio::test]
async fn exhausted_retries_after_three_pages_is_partial() {
    let h = harness(2, |page, url| {
        if page == 4 {
            status(url, 503, "")
        } else {
            ok(url, page_body(page, &[format!("p{page}").as_str()], true))
        }
    });

    let report = h.pipeline.run(&request(10)).await.unwrap();
    assert_eq!(report.summary.outcome, RunOutcome::Partial);
    assert_eq!(report.summary.pages_fetched, 3);

    let ids: Vec<&str> = report.records.iter().map(|r| r.record.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    let pages: Vec<u32> = report.records.iter().map(|r| r.record.source_page).collect();
    assert_eq!(pages, vec![1, 2, 3]);

    let cause = report.summary.cause.unwrap();
    assert!(cause.contains("3 attempts"), "cause: {cause}");
    assert!(cause.contains("503"), "cause: {cause}");
    assert_eq!(h.transport.requested(), vec![1, 2, 3, 4, 4, 4]);
    assert!(h.sink.events().contains(&"stopped:3".to_owned()));
    assert_eq!(h.sink.transitions(), HAPPY_PATH);
}

#[tokio::test]
async fn first_page_failure_fails_the_run() {
    let h = harness(1, |_, url| status(url, 503, ""));

    let err = h.pipeline.run(&request(5)).await.unwrap_err();
    assert_eq!(err.stage, Stage::Fetching);
    assert_eq!(err.pages_fetched, 0);
    assert!(matches!(
        err.source,
        FailureCause::Scraper(ScraperError::FetchExhausted { attempts: 2, .. })
    ));
    assert_eq!(h.sink.transitions(), vec!["idle->fetching", "fetching->failed"]);
}

#[tokio::test]
async fn non_retryable_first_page_fails_without_retry() {
    let h = harness(3, |_, url| status(url, 404, "not found"));

    let err = h.pipeline.run(&request(5)).await.unwrap_err();
    assert!(matches!(
        err.source,
        FailureCause::Scraper(ScraperError::HttpStatus { status: 404, .. })
    ));
    assert_eq!(h.transport.requested(), vec![1]);
}

#[tokio::test]
async fn invalid_config_fails_before_any_request() {
    let mut config = AppConfig::default();
    config.scraper.base_url = "ftp://weedmaps.test".to_owned();
    let h = harness_with(&config, 0, |page, url| ok(url, page_body(page, &["a"], false)));

    let err = h.pipeline.run(&request(1)).await.unwrap_err();
    assert_eq!(err.stage, Stage::Config);
    assert!(matches!(err.source, FailureCause::Config(_)));
    assert!(h.transport.requested().is_empty());
    assert_eq!(h.sink.transitions(), vec!["idle->failed"]);
}

#[tokio::test]
async fn empty_first_page_is_done_with_no_records() {
    let h = harness(0, |page, url| ok(url, page_body(page, &[], true)));

    let report = h.pipeline.run(&request(5)).await.unwrap();
    assert_eq!(report.summary.outcome, RunOutcome::Done);
    assert_eq!(report.summary.pages_fetched, 0);
    assert!(report.records.is_empty());
}

#[tokio::test]
async fn cancellation_before_start_is_partial_and_empty() {
    let (handle, signal) = cancel_pair();
    handle.cancel();
    let h = harness(0, |page, url| ok(url, page_body(page, &["a"], true)));

    let report = h.pipeline.with_cancel(signal).run(&request(5)).await.unwrap();
    assert_eq!(report.summary.outcome, RunOutcome::Partial);
    assert_eq!(report.summary.pages_fetched, 0);
    assert_eq!(report.summary.cause.as_deref(), Some("scrape cancelled"));
    assert!(report.records.is_empty());
    assert!(h.transport.requested().is_empty());
}

#[tokio::test]
async fn cancellation_mid_run_keeps_fetched_pages() {
    let (handle, signal) = cancel_pair();
    let h = harness(0, move |page, url| {
        if page == 2 {
            handle.cancel();
        }
        ok(url, page_body(page, &[format!("p{page}").as_str()], true))
    });

    let report = h.pipeline.with_cancel(signal).run(&request(10)).await.unwrap();
    assert_eq!(report.summary.outcome, RunOutcome::Partial);
    assert_eq!(report.summary.pages_fetched, 2);
    assert_eq!(report.records.len(), 2);
    assert_eq!(h.transport.requested(), vec![1, 2]);
}

#[tokio::test]
async fn malformed_items_are_dropped_and_counted() {
    let h = harness(0, |_, url| {
        let body = json!({
            "data": { "listings": [
                { "id": "ok-1", "name": "Blue Dream", "category": "Flower", "price": "$30" },
                { "id": "bad-1", "name": "Mystery", "category": "Flower", "price": "N/A" },
                { "name": "No id", "price": "$5" },
            ]},
            "meta": { "has_next_page": false },
        });
        ok(url, body.to_string())
    });

    let report = h.pipeline.run(&request(3)).await.unwrap();
    assert_eq!(report.summary.outcome, RunOutcome::Done);
    assert_eq!(report.summary.items_dropped_malformed, 2);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].record.id, "ok-1");
    let dropped = h.sink.events().iter().filter(|e| e.starts_with("dropped:")).count();
    assert_eq!(dropped, 2);
}

#[tokio::test]
async fn duplicate_ids_across_pages_are_flagged_not_dropped() {
    let h = harness(0, |page, url| {
        let ids: &[&str] = if page == 1 { &["a", "b"] } else { &["b", "c"] };
        ok(url, page_body(page, ids, page < 2))
    });

    let report = h.pipeline.run(&request(5)).await.unwrap();
    assert_eq!(report.summary.records_total, 4);
    assert_eq!(report.summary.records_invalid, 2);

    let flagged: Vec<(&str, u32)> = report
        .records
        .iter()
        .filter(|r| !r.validation.is_valid())
        .map(|r| (r.record.id.as_str(), r.record.source_page))
        .collect();
    assert_eq!(flagged, vec![("b", 1), ("b", 2)]);
    assert!(h.sink.events().contains(&"invalid:b:duplicate_id".to_owned()));
}

#[test]
fn failed_summary_carries_stage_and_cause() {
    let err = PipelineError::new(
        Stage::Fetching,
        0,
        ScraperError::HttpStatus {
            status: 403,
            url: "https://weedmaps.test/api/v1/listings".to_owned(),
        },
    );
    let summary = err.failed_summary(&request(2), run_at(), run_at());
    assert_eq!(summary.outcome, RunOutcome::Failed);
    assert_eq!(summary.records_total, 0);
    let cause = summary.cause.unwrap();
    assert!(cause.starts_with("scrape failed during fetching after 0 pages"), "cause: {cause}");
    assert!(cause.contains("403"), "cause: {cause}");
}

#[test]
fn error_chain_names_cause_once() {
    let err = PipelineError::new(
        Stage::Fetching,
        0,
        ScraperError::HttpStatus {
            status: 403,
            url: "https://weedmaps.test/api/v1/listings".to_owned(),
        },
    );

    let mut chain = vec![err.to_string()];
    let mut next = std::error::Error::source(&err);
    while let Some(cause) = next {
        chain.push(cause.to_string());
        next = cause.source();
    }

    assert_eq!(chain[0], "scrape failed during fetching after 0 pages");
    assert_eq!(chain.join(": ").matches("403").count(), 1, "chain: {chain:?}");
}

#[test]
fn state_machine_edges() {
    use PipelineState as S;
    assert!(S::Idle.can_advance_to(S::Fetching));
    assert!(S::Idle.can_advance_to(S::Failed));
    assert!(S::Validating.can_advance_to(S::Done));
    assert!(!S::Done.can_advance_to(S::Failed));
    assert!(!S::Failed.can_advance_to(S::Fetching));
    assert!(!S::Fetching.can_advance_to(S::Validating));
}
