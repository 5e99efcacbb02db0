// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{article, test_settings};
use scrapemaster::application::scraper::Scraper;
use scrapemaster::domain::models::selector::Selector;
use scrapemaster::domain::models::task::RequestTask;
use scrapemaster::utils::errors::ErrorKind;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_article(server: &MockServer, route: &str, title: &str, delay_ms: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(article(title, "Harbor Logistics"))
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_batch_results_follow_input_order() {
    let server = MockServer::start().await;
    // Earlier pages answer slower so completion order is reversed
    mount_article(&server, "/a", "A", 150).await;
    mount_article(&server, "/b", "B", 75).await;
    mount_article(&server, "/c", "C", 0).await;

    let scraper = Scraper::from_settings(&test_settings()).unwrap();
    let tasks: Vec<RequestTask> = ["a", "b", "c"]
        .iter()
        .map(|p| {
            RequestTask::new(format!("{}/{}", server.uri(), p))
                .with_selector("title", Selector::css("h1"))
        })
        .collect();
    let ids: Vec<_> = tasks.iter().map(|t| t.id).collect();

    let results = scraper.scrape_batch(tasks).await;

    assert_eq!(results.iter().map(|r| r.task_id).collect::<Vec<_>>(), ids);
    let titles: Vec<_> = results.iter().map(|r| r.field_text("title")).collect();
    assert_eq!(titles, vec![Some("A"), Some("B"), Some("C")]);
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let server = MockServer::start().await;
    mount_article(&server, "/ok", "Fine", 0).await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let scraper = Scraper::from_settings(&test_settings()).unwrap();
    let results = scraper
        .scrape_batch(vec![
            RequestTask::new(format!("{}/ok", server.uri()))
                .with_selector("title", Selector::css("h1")),
            RequestTask::new(format!("{}/blocked", server.uri())),
            RequestTask::new("not a url"),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert_eq!(results[1].error_kind, Some(ErrorKind::Blocked));
    assert_eq!(results[2].error_kind, Some(ErrorKind::ParseError));
}

#[tokio::test]
async fn test_empty_batch_returns_nothing() {
    let scraper = Scraper::from_settings(&test_settings()).unwrap();
    assert!(scraper.scrape_batch(Vec::new()).await.is_empty());
}

#[tokio::test]
async fn test_cancel_stops_pending_tasks() {
    let server = MockServer::start().await;
    mount_article(&server, "/slow", "Slow", 2_000).await;

    let scraper = std::sync::Arc::new(Scraper::from_settings(&test_settings()).unwrap());
    let tasks: Vec<RequestTask> = (0..4)
        .map(|_| RequestTask::new(format!("{}/slow", server.uri())).with_cache(false))
        .collect();

    let handle = {
        let scraper = scraper.clone();
        tokio::spawn(async move { scraper.scrape_batch(tasks).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    scraper.cancel();

    let results = handle.await.unwrap();
    assert_eq!(results.len(), 4);
    assert!(results
        .iter()
        .all(|r| r.error_kind == Some(ErrorKind::Cancelled)));
}
