//! HTTP delivery tests against a local mock collector

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{page, site_config};
use vantevo::payload::{EcommerceValues, LineItem};
use vantevo::transport::{Body, HttpTransport, Settlement, Transport};
use vantevo::{Config, Tracker};

fn collector_config(server: &MockServer) -> Config {
    Config {
        proxy_server: format!("{}/event", server.uri()),
        proxy_server_ecommerce: format!("{}/event/ecommerce", server.uri()),
        ..site_config()
    }
}

#[tokio::test]
async fn test_standard_event_is_posted_as_text_plain() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/event"))
        .and(header("content-type", "text/plain"))
        .and(body_string_contains("\"e_n\":\"Signup\""))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = Tracker::with_http(collector_config(&server), page("https://example.com/"))
        .expect("tracker");
    let settlement = tracker
        .record(Some("Signup"), None, None)
        .into_delivery()
        .expect("sent")
        .settled()
        .await;

    assert_eq!(settlement, Some(Settlement::Status(202)));

    let requests = server.received_requests().await.expect("recording enabled");
    let payload: Value = serde_json::from_slice(&requests[0].body).expect("JSON body");
    assert_eq!(payload["url"], "https://example.com/");
    assert_eq!(payload["params"], "domain=example.com");
}

#[tokio::test]
async fn test_ecommerce_event_is_posted_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/event/ecommerce"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = Tracker::with_http(collector_config(&server), page("https://example.com/cart"))
        .expect("tracker");
    let values = EcommerceValues {
        items: vec![LineItem::new("sku-9", "Poster")],
        total: Some(25.0),
        ..Default::default()
    };
    let settlement = tracker
        .record_ecommerce("add_to_cart", values, None)
        .into_delivery()
        .expect("sent")
        .settled()
        .await;

    assert_eq!(settlement, Some(Settlement::Status(200)));

    let requests = server.received_requests().await.expect("recording enabled");
    let payload: Value = serde_json::from_slice(&requests[0].body).expect("JSON body");
    assert_eq!(payload["event"], "add_to_cart");
    assert_eq!(payload["items"][0]["name"], "Poster");
    assert_eq!(payload["total"], 25.0);
}

#[tokio::test]
async fn test_server_error_still_runs_callback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let tracker = Tracker::with_http(collector_config(&server), page("https://example.com/"))
        .expect("tracker");
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let settlement = tracker
        .record(None, None, Some(Box::new(move || flag.store(true, Ordering::SeqCst))))
        .into_delivery()
        .expect("sent")
        .settled()
        .await;

    assert_eq!(settlement, Some(Settlement::Status(500)));
    assert!(called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_unreachable_collector_reports_failure() {
    let server = MockServer::start().await;
    let endpoint = format!("{}/event", server.uri());
    drop(server);

    let transport = HttpTransport::new().expect("client");
    let result = transport.post(&endpoint, Body::text("{}".into())).await;
    assert!(result.is_err());
}
