//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! reqwest transport, session warm-up, retries and the full page loop.

use douban_top250::config::{Config, PauseWindow};
use douban_top250::crawler::{
    fetch_url, init_session, BackoffPolicy, Coordinator, HttpRequest, HttpTransport,
    RecordingSleeper, SessionState, Transport, TransportError, ValidationOutcome,
};
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn listing_page(titles: &[(&str, Option<&str>)]) -> String {
    let items: String = titles
        .iter()
        .map(|(title, rating)| {
            let rating = rating
                .map(|r| format!(r#"<span class="rating_num">{}</span>"#, r))
                .unwrap_or_default();
            format!(
                r#"<li><div class="item">
                     <div class="hd"><a href="https://movie.douban.com/subject/1/"><span class="title">{}</span></a></div>
                     <div class="bd"><p>1994 / 美国 / 剧情</p><div class="star">{}<span>1000人评价</span></div></div>
                   </div></li>"#,
                title, rating
            )
        })
        .collect();
    format!(
        r#"<html><head><meta charset="utf-8"></head><body><ol class="grid_view">{}</ol></body></html>"#,
        items
    )
}

/// Configuration pointing at the mock server, with no pauses
fn create_test_config(base_url: &str, warmup_urls: Vec<String>) -> Config {
    let mut config = Config::default();
    config.crawler.base_url = base_url.to_string();
    config.crawler.inter_page_delay_ms = 0;
    config.request.attempt_budget = 2;
    config.request.timeout_secs = 5;
    config.request.first_attempt_pause = PauseWindow::zero();
    config.request.retry_pause = PauseWindow::zero();
    config.request.page_jitter = PauseWindow::zero();
    config.session.warmup_urls = warmup_urls;
    config.session.warmup_pause = PauseWindow::zero();
    config
}

fn request(url: &str) -> HttpRequest {
    HttpRequest {
        url: Url::parse(url).expect("valid url"),
        headers: HeaderMap::new(),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_http_transport_returns_body_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>hello</html>")
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new().expect("client builds");
    let response = transport
        .get(request(&format!("{}/page", mock_server.uri())))
        .await
        .expect("request succeeds");

    assert_eq!(response.body, b"<html>hello</html>");
    assert_eq!(
        response.headers.get("content-type").unwrap(),
        "text/html; charset=utf-8"
    );
}

#[tokio::test]
async fn test_http_transport_non_2xx_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new().expect("client builds");
    let result = transport
        .get(request(&format!("{}/top250", mock_server.uri())))
        .await;

    assert!(matches!(
        result,
        Err(TransportError::Status { status: 403, .. })
    ));
}

#[tokio::test]
async fn test_http_transport_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new().expect("client builds");
    let mut slow = request(&format!("{}/slow", mock_server.uri()));
    slow.timeout = Duration::from_millis(200);

    let result = transport.get(slow).await;
    assert!(matches!(result, Err(TransportError::Timeout { .. })));
}

#[tokio::test]
async fn test_fetch_retries_server_errors_then_succeeds() {
    let mock_server = MockServer::start().await;
    let body = listing_page(&[("A", Some("9.1"))]);

    Mock::given(method("GET"))
        .and(path("/top250"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/top250"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new().expect("client builds");
    let session = SessionState::new(&Config::default().session, &[]);
    let sleeper = RecordingSleeper::new();
    let url = Url::parse(&format!("{}/top250", mock_server.uri())).unwrap();

    let outcome = fetch_url(
        &transport,
        &session,
        &sleeper,
        &url,
        None,
        &BackoffPolicy::immediate(3),
    )
    .await;

    assert!(outcome.succeeded);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.html, body);
    assert_eq!(outcome.validation, Some(ValidationOutcome::Valid));
}

#[tokio::test]
async fn test_fetch_gives_up_after_budget() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new().expect("client builds");
    let session = SessionState::new(&Config::default().session, &[]);
    let sleeper = RecordingSleeper::new();
    let url = Url::parse(&format!("{}/top250", mock_server.uri())).unwrap();

    let outcome = fetch_url(
        &transport,
        &session,
        &sleeper,
        &url,
        None,
        &BackoffPolicy::immediate(3),
    )
    .await;

    assert!(!outcome.succeeded);
    assert!(outcome.html.is_empty());
    assert_eq!(sleeper.pauses().len(), 3);
}

#[tokio::test]
async fn test_warmup_cookie_is_sent_on_later_requests() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/warmup"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sid=warm; Path=/"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&format!("{}/top250", base), vec![format!("{}/warmup", base)]);
    let transport = HttpTransport::new().expect("client builds");
    let sleeper = RecordingSleeper::new();
    let base_url = Url::parse(&config.crawler.base_url).unwrap();

    let session = init_session(
        &transport,
        &sleeper,
        &config.session,
        &base_url,
        Duration::from_secs(5),
    )
    .await;

    assert!(session.is_warmed_up());
    assert_eq!(session.cookie_header(&base_url).as_deref(), Some("sid=warm"));
}

#[tokio::test]
async fn test_full_crawl_skips_failed_page() {
    // Start a mock server
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();
    let listing = format!("{}/top250", base);
    let page1 = format!("{}?start=0&filter=", listing);

    // Warm-up hands out the session cookie
    Mock::given(method("GET"))
        .and(path("/warmup"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>home</html>")
                .insert_header("set-cookie", "sid=warm; Path=/"),
        )
        .mount(&mock_server)
        .await;

    // Page 1 requires the warm-up cookie and the bare listing as referer
    Mock::given(method("GET"))
        .and(path("/top250"))
        .and(query_param("start", "0"))
        .and(header("cookie", "sid=warm"))
        .and(header("referer", listing.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&[("A", Some("9.1")), ("B", None)]))
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // Page 2 is down for the whole run
    Mock::given(method("GET"))
        .and(path("/top250"))
        .and(query_param("start", "25"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&mock_server)
        .await;

    // Page 3 expects page 2 as referer even though page 2 failed
    Mock::given(method("GET"))
        .and(path("/top250"))
        .and(query_param("start", "50"))
        .and(header("referer", format!("{}?start=25&filter=", listing).as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&[("C", Some("7.5"))]))
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&listing, vec![format!("{}/warmup", base)]);
    let transport = Arc::new(HttpTransport::new().expect("client builds"));
    let sleeper = Arc::new(RecordingSleeper::new());
    let mut coordinator =
        Coordinator::with_parts(config, transport, sleeper).expect("Failed to create coordinator");

    assert_eq!(coordinator.page_url(0).as_str(), page1);

    let records = coordinator.crawl_all(3, Duration::ZERO).await;

    let titles: Vec<&str> = records.iter().map(|r| r.title()).collect();
    assert_eq!(titles, vec!["A", "B", "C"]);
    assert_eq!(records[0].rating(), Some(9.1));
    assert_eq!(records[1].rating(), None);
    assert_eq!(records[2].rating(), Some(7.5));
    assert_eq!(records[0].rating_count(), Some(1000));
    assert_eq!(records[0].year(), Some(1994));
}

#[tokio::test]
async fn test_crawl_survives_warmup_failure_and_blocked_page() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/warmup"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    // The interstitial is returned once and not retried
    Mock::given(method("GET"))
        .and(path("/top250"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><h1>检测到异常请求</h1></body></html>"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&format!("{}/top250", base), vec![format!("{}/warmup", base)]);
    let mut coordinator = Coordinator::with_parts(
        config,
        Arc::new(HttpTransport::new().expect("client builds")),
        Arc::new(RecordingSleeper::new()),
    )
    .expect("Failed to create coordinator");

    let records = coordinator.crawl_all(1, Duration::ZERO).await;
    assert!(records.is_empty());
}
