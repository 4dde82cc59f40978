//! Integration tests for title fetching and extraction
//!
//! A wiremock server stands in for the pages a tweet links to. The tests
//! pin down the per-URL tolerance contract: a failing URL leaves a gap in
//! the title list, a lone success still carries the candidate, and a
//! candidate with nothing usable is skipped under its first failure.

use std::time::Duration;
use tweetpipe_ingest::config::FetchConfig;
use tweetpipe_ingest::error::SkipReason;
use tweetpipe_ingest::titles::TitleExtractor;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Timeouts short enough that the delay-based tests stay quick
fn fast_config() -> FetchConfig {
    FetchConfig {
        connect_timeout_secs: 1,
        fetch_timeout_secs: 1,
    }
}

fn extractor() -> TitleExtractor {
    TitleExtractor::new(&fast_config()).unwrap()
}

async fn serve_page(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

async fn serve_slow_page(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<title>never seen</title>")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(server)
        .await;
}

// ============================================================================
// Extraction and Cleanup
// ============================================================================

#[tokio::test]
async fn test_extracts_and_decodes_title() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        "/a",
        200,
        "<html><head><title>Hello &amp; Bye</title></head><body></body></html>",
    )
    .await;

    let titles = extractor()
        .extract(1, &[format!("{}/a", server.uri())])
        .await
        .unwrap();

    assert_eq!(titles, vec!["Hello & Bye"]);
}

#[tokio::test]
async fn test_embedded_newlines_are_flattened() {
    let server = MockServer::start().await;
    serve_page(&server, "/n", 200, "<title>\n  Front \nPage\n</title>").await;

    let titles = extractor()
        .extract(2, &[format!("{}/n", server.uri())])
        .await
        .unwrap();

    assert_eq!(titles, vec!["Front  Page"]);
}

#[tokio::test]
async fn test_titles_follow_url_order() {
    let server = MockServer::start().await;
    serve_page(&server, "/one", 200, "<title>One</title>").await;
    serve_page(&server, "/two", 200, "<title>Two</title>").await;

    let urls = vec![
        format!("{}/two", server.uri()),
        format!("{}/one", server.uri()),
    ];
    let titles = extractor().extract(3, &urls).await.unwrap();

    assert_eq!(titles, vec!["Two", "One"]);
}

#[tokio::test]
async fn test_error_page_title_still_counts() {
    let server = MockServer::start().await;
    serve_page(&server, "/gone", 404, "<title>404 Not Found</title>").await;

    let titles = extractor()
        .extract(4, &[format!("{}/gone", server.uri())])
        .await
        .unwrap();

    assert_eq!(titles, vec!["404 Not Found"]);
}

// ============================================================================
// Per-URL Tolerance
// ============================================================================

#[tokio::test]
async fn test_timed_out_url_leaves_a_gap() {
    let server = MockServer::start().await;
    serve_slow_page(&server, "/slow").await;
    serve_page(&server, "/fast", 200, "<title>Hello &amp; Bye</title>").await;

    let urls = vec![
        format!("{}/slow", server.uri()),
        format!("{}/fast", server.uri()),
    ];
    let titles = extractor().extract(5, &urls).await.unwrap();

    // The candidate survives on its one good URL.
    assert_eq!(titles, vec!["Hello & Bye"]);
}

#[tokio::test]
async fn test_all_urls_failing_reports_the_first_reason() {
    let server = MockServer::start().await;
    serve_slow_page(&server, "/slow").await;
    serve_page(&server, "/bare", 200, "<html><body>no title here</body></html>").await;

    let urls = vec![
        format!("{}/slow", server.uri()),
        format!("{}/bare", server.uri()),
    ];
    let err = extractor().extract(6, &urls).await.unwrap_err();

    assert!(matches!(err, SkipReason::Timeout { .. }));
}

#[tokio::test]
async fn test_page_without_title_is_skipped() {
    let server = MockServer::start().await;
    serve_page(&server, "/bare", 200, "<html><body>plain</body></html>").await;

    let err = extractor()
        .extract(7, &[format!("{}/bare", server.uri())])
        .await
        .unwrap_err();

    assert!(matches!(err, SkipReason::Extraction { .. }));
}

#[tokio::test]
async fn test_unreachable_host_is_a_transport_failure() {
    // Nothing listens on port 9; classification depends on how the OS
    // refuses, so either transport reason is acceptable.
    let err = extractor()
        .extract(8, &["http://127.0.0.1:9/x".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SkipReason::Connection { .. } | SkipReason::Timeout { .. }
    ));
}

// ============================================================================
// Length Bound
// ============================================================================

#[tokio::test]
async fn test_oversize_title_is_rejected() {
    let server = MockServer::start().await;
    let body = format!("<title>{}</title>", "x".repeat(1000));
    serve_page(&server, "/long", 200, &body).await;

    let err = extractor()
        .extract(9, &[format!("{}/long", server.uri())])
        .await
        .unwrap_err();

    assert!(matches!(err, SkipReason::Extraction { .. }));
}

#[tokio::test]
async fn test_title_just_under_the_bound_passes() {
    let server = MockServer::start().await;
    let title = "y".repeat(999);
    serve_page(&server, "/fits", 200, &format!("<title>{title}</title>")).await;

    let titles = extractor()
        .extract(10, &[format!("{}/fits", server.uri())])
        .await
        .unwrap();

    assert_eq!(titles, vec![title]);
}
