// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{article, scraper_with_renderer, spa_shell, test_settings, StaticRenderer};
use scrapemaster::application::scraper::Scraper;
use scrapemaster::config::settings::Settings;
use scrapemaster::domain::models::scrape_result::FieldValue;
use scrapemaster::domain::models::selector::Selector;
use scrapemaster::domain::models::task::{RenderMode, RequestTask};
use scrapemaster::utils::errors::ErrorKind;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

#[tokio::test]
async fn test_scrape_extracts_every_selector_kind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/company"))
        .and(header_exists("user-agent"))
        .and(header_exists("referer"))
        .respond_with(html(article("Quarterly Report", "Harbor Logistics")))
        .mount(&server)
        .await;

    let scraper = Scraper::from_settings(&test_settings()).unwrap();
    let task = RequestTask::new(format!("{}/company", server.uri()))
        .with_selector("title", Selector::css("h1.title"))
        .with_selector("website", Selector::attribute(".company", "data-website"))
        .with_selector("tags", Selector::css("ul.tags li").all())
        .with_selector("heading", Selector::xpath("//h1[@class='title']/text()"))
        .with_selector("price", Selector::css(".price"));

    let result = scraper.scrape(task).await;

    assert!(result.success, "{:?}", result.error_message);
    assert!(!result.empty);
    assert_eq!(result.field_text("title"), Some("Quarterly Report"));
    assert_eq!(result.field_text("heading"), Some("Quarterly Report"));
    assert_eq!(
        result.field_text("website"),
        Some("https://harborlogistics.com")
    );
    assert_eq!(
        result.fields.get("tags"),
        Some(&Some(FieldValue::List(vec![
            "alpha".to_string(),
            "beta".to_string()
        ])))
    );
    assert_eq!(result.fields.get("price"), Some(&None));
    assert_eq!(result.matched_fields(), 4);
    assert_eq!(result.status_code, Some(200));
    assert_eq!(result.attempts, 1);
    assert!(result.bytes > 0);
}

#[tokio::test]
async fn test_repeat_request_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cached"))
        .respond_with(html(article("Cached", "Harbor Logistics")))
        .expect(1)
        .mount(&server)
        .await;

    let scraper = Scraper::from_settings(&test_settings()).unwrap();
    let url = format!("{}/cached", server.uri());
    let task = || RequestTask::new(url.clone()).with_selector("title", Selector::css("h1"));

    let first = scraper.scrape(task()).await;
    let second = scraper.scrape(task()).await;

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.field_text("title"), Some("Cached"));

    let stats = scraper.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.stores, 1);
}

#[tokio::test]
async fn test_changed_selectors_miss_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html(article("Page", "Harbor Logistics")))
        .expect(2)
        .mount(&server)
        .await;

    let scraper = Scraper::from_settings(&test_settings()).unwrap();
    let url = format!("{}/page", server.uri());

    scraper
        .scrape(RequestTask::new(url.clone()).with_selector("title", Selector::css("h1")))
        .await;
    let second = scraper
        .scrape(RequestTask::new(url).with_selector("company", Selector::css(".company")))
        .await;

    assert!(!second.from_cache);
    assert_eq!(second.field_text("company"), Some("Harbor Logistics"));
}

#[tokio::test]
async fn test_server_errors_are_retried_up_to_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let scraper = Scraper::from_settings(&test_settings()).unwrap();
    let result = scraper
        .scrape(RequestTask::new(format!("{}/flaky", server.uri())))
        .await;

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::NetworkError));
    assert_eq!(result.attempts, 3);
    assert_eq!(result.status_code, Some(503));
}

#[tokio::test]
async fn test_dead_proxy_records_one_outcome_per_attempt() {
    let server = MockServer::start().await;
    let settings = Settings {
        // Nothing listens on port 1, so every attempt fails to connect
        proxies: vec!["http://127.0.0.1:1".to_string()],
        ..test_settings()
    };

    let scraper = Scraper::from_settings(&settings).unwrap();
    let result = scraper
        .scrape(RequestTask::new(format!("{}/via-proxy", server.uri())))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::NetworkError));
    assert_eq!(result.attempts, 3);
    assert_eq!(result.proxy_id.as_deref(), Some("http://127.0.0.1:1"));

    let stats = scraper.proxy_stats();
    assert_eq!(stats.proxies[0].total_requests, 3);
    assert_eq!(stats.cooldown, 1);
    assert_eq!(stats.proxies[0].success_rate, 0.0);
}

#[tokio::test]
async fn test_too_many_requests_is_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let scraper = Scraper::from_settings(&test_settings()).unwrap();
    let result = scraper.scrape(RequestTask::new(server.uri())).await;

    assert_eq!(result.error_kind, Some(ErrorKind::Blocked));
    assert_eq!(result.attempts, 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let scraper = Scraper::from_settings(&test_settings()).unwrap();
    let result = scraper.scrape(RequestTask::new(server.uri())).await;

    assert_eq!(result.error_kind, Some(ErrorKind::ParseError));
    assert_eq!(result.attempts, 1);
}

#[tokio::test]
async fn test_client_rendered_page_is_delegated_to_renderer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(html(spa_shell()))
        .expect(1)
        .mount(&server)
        .await;

    let renderer = StaticRenderer::new(article("Rendered Title", "Harbor Logistics"));
    let scraper = scraper_with_renderer(&test_settings(), renderer.clone());

    let result = scraper
        .scrape(
            RequestTask::new(format!("{}/app", server.uri()))
                .with_selector("title", Selector::css("h1")),
        )
        .await;

    assert!(result.success);
    assert!(result.rendered);
    assert_eq!(result.field_text("title"), Some("Rendered Title"));
    assert_eq!(renderer.calls(), 1);
}

#[tokio::test]
async fn test_render_never_keeps_the_static_shell() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(spa_shell()))
        .mount(&server)
        .await;

    let renderer = StaticRenderer::new(article("Rendered Title", "Harbor Logistics"));
    let scraper = scraper_with_renderer(&test_settings(), renderer.clone());

    let result = scraper
        .scrape(
            RequestTask::new(server.uri())
                .with_selector("title", Selector::css("h1"))
                .with_render(RenderMode::Never),
        )
        .await;

    assert!(result.success);
    assert!(result.empty);
    assert!(!result.rendered);
    assert_eq!(renderer.calls(), 0);
}

#[tokio::test]
async fn test_render_without_renderer_is_render_error() {
    let scraper = Scraper::from_settings(&test_settings()).unwrap();

    let result = scraper
        .scrape(RequestTask::new("https://example.org/").with_render(RenderMode::Always))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::RenderError));
}
