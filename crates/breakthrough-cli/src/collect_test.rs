use breakthrough_core::RunOutcome;
use breakthrough_scraper::cancel_pair;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_owned()).collect()
}

fn test_config(base_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.scraper.base_url = base_url.to_owned();
    config.scraper.delay_range = (0.0, 0.0);
    config.scraper.max_retries = 0;
    config.scraper.backoff_base_secs = 0.0;
    config.scraper.backoff_cap_secs = 0.0;
    config
}

fn one_listing(id: &str) -> serde_json::Value {
    json!({
        "data": { "listings": [{ "id": id, "name": "Listing", "category": "Flower", "price": "$9.99" }] },
        "meta": { "has_next_page": false }
    })
}

#[test]
fn build_requests_is_cross_product_in_order() {
    let requests = build_requests(
        &strings(&["california", "oregon"]),
        &strings(&["flower", "vape"]),
        3,
    )
    .unwrap();

    let pairs: Vec<(&str, &str)> = requests
        .iter()
        .map(|r| (r.location(), r.product_type()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("california", "flower"),
            ("california", "vape"),
            ("oregon", "flower"),
            ("oregon", "vape"),
        ]
    );
    assert!(requests.iter().all(|r| r.max_pages() == 3));
}

#[test]
fn build_requests_skips_repeats() {
    let requests = build_requests(
        &strings(&["california", " california "]),
        &strings(&["flower"]),
        1,
    )
    .unwrap();
    assert_eq!(requests.len(), 1);
}

#[test]
fn build_requests_rejects_blank_location() {
    let err = build_requests(&strings(&[" "]), &strings(&["flower"]), 1).unwrap_err();
    assert!(format!("{err:#}").contains("location must be non-empty"), "got: {err:#}");
}

#[test]
fn build_requests_rejects_zero_pages() {
    assert!(build_requests(&strings(&["california"]), &strings(&["flower"]), 0).is_err());
}

#[tokio::test]
async fn run_all_keeps_request_order_and_isolates_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/listings"))
        .and(query_param("location", "california"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_listing("ca-1")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/listings"))
        .and(query_param("location", "oregon"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/listings"))
        .and(query_param("location", "nevada"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_listing("nv-1")))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let requests = build_requests(
        &strings(&["california", "oregon", "nevada"]),
        &strings(&["flower"]),
        2,
    )
    .unwrap();

    let results = run_all(&config, requests, CancelSignal::never(), 3)
        .await
        .unwrap();

    let outcomes: Vec<(&str, RunOutcome)> = results
        .iter()
        .map(|r| (r.summary.location.as_str(), r.summary.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("california", RunOutcome::Done),
            ("oregon", RunOutcome::Failed),
            ("nevada", RunOutcome::Done),
        ]
    );
    assert_eq!(results[0].records[0].record.id, "ca-1");
    assert!(results[1].records.is_empty());
    assert!(results[1]
        .summary
        .cause
        .as_deref()
        .is_some_and(|c| c.contains("404")));
}

#[tokio::test]
async fn run_all_after_cancel_reports_partial_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_listing("x")))
        .expect(0)
        .mount(&server)
        .await;

    let (handle, signal) = cancel_pair();
    handle.cancel();

    let config = test_config(&server.uri());
    let requests =
        build_requests(&strings(&["california", "oregon"]), &strings(&["flower"]), 2).unwrap();
    let results = run_all(&config, requests, signal, 2).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results
        .iter()
        .all(|r| r.summary.outcome == RunOutcome::Partial && r.records.is_empty()));
}

#[tokio::test]
async fn run_all_rejects_invalid_config() {
    let mut config = AppConfig::default();
    config.scraper.page_size = 0;
    let requests = build_requests(&strings(&["california"]), &strings(&["flower"]), 1).unwrap();

    let err = run_all(&config, requests, CancelSignal::never(), 1)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("page_size"), "got: {err:#}");
}
