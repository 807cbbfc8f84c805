//! Integration tests for the search and statistics endpoints
//!
//! Requests go through the full router with its middleware, backed by the
//! in-memory store and a manual clock.

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{header::LOCATION, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use searchlog_core::config::ServerConfig;
use searchlog_core::{CoalescerConfig, ManualClock, MemoryStore, StatisticsWorker, Storage};
use searchlog_serve::{create_app, AppState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: MemoryStore,
    clock: ManualClock,
}

impl TestApp {
    fn new(trust_forwarded_for: bool) -> Self {
        let store = MemoryStore::new();
        for title in [
            "How do I cancel my subscription?",
            "How do I cancel my account?",
            "Can I upgrade my account?",
            "Can you help me?",
            "I don't know how to enroll a new person.",
            "Is it possible to generate new users?",
        ] {
            store.add_article(title);
        }

        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 4, 6, 19, 11, 14).unwrap());
        let storage = Storage::from_backend(store.clone());
        let worker = Arc::new(StatisticsWorker::new(
            storage.log.clone(),
            storage.oracle.clone(),
            CoalescerConfig::default(),
        ));
        let config = ServerConfig {
            trust_forwarded_for,
            ..ServerConfig::default()
        };
        let state = AppState::new(storage, Arc::new(clock.clone()), worker, config.clone());

        Self {
            router: create_app(state, &config),
            store,
            clock,
        }
    }

    /// Serves requests as if they all came from one peer address
    fn behind_peer(mut self, addr: SocketAddr) -> Self {
        self.router = self.router.layer(MockConnectInfo(addr));
        self
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        client: Option<&str>,
    ) -> (StatusCode, Option<String>, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(client) = client {
            builder = builder.header("x-forwarded-for", client);
        }

        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .map(|value| value.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, location, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn search(&self, client: &str, term: &str, submit: bool, pause_ms: i64) -> StatusCode {
        let uri = format!("/search?term={}&submit={}", term.replace(' ', "+"), submit);
        let (status, _, _) = self.request(Method::GET, &uri, Some(client)).await;
        self.clock.advance(Duration::milliseconds(pause_ms));
        status
    }

    async fn run_worker(&self) -> Value {
        let (status, _, body) = self.request(Method::POST, "/worker/run", None).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_str(&body).unwrap()
    }

    async fn statistics(&self) -> Value {
        let (status, _, body) = self
            .request(Method::GET, "/search/statistics", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_str(&body).unwrap()
    }
}

#[tokio::test]
async fn test_search_returns_matching_articles_case_insensitively() {
    let app = TestApp::new(true);

    let (status, _, lower) = app
        .request(Method::GET, "/search?term=how", Some("10.0.0.1"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, upper) = app
        .request(Method::GET, "/search?term=How", Some("10.0.0.1"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lower, upper);

    let articles: Value = serde_json::from_str(&lower).unwrap();
    let titles: Vec<&str> = articles
        .as_array()
        .unwrap()
        .iter()
        .map(|article| article["title"].as_str().unwrap())
        .collect();
    assert_eq!(
        titles,
        vec![
            "How do I cancel my subscription?",
            "How do I cancel my account?",
            "I don't know how to enroll a new person.",
        ]
    );
    assert_eq!(app.store.event_count(), 2);
}

#[tokio::test]
async fn test_blank_term_is_rejected_and_not_logged() {
    let app = TestApp::new(true);

    for uri in ["/search?term=", "/search?term=+++", "/search"] {
        let (status, _, body) = app.request(Method::GET, uri, Some("10.0.0.1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);

        let error: Value = serde_json::from_str(&body).unwrap();
        assert!(error["error"].as_str().unwrap().contains("empty"));
        assert_eq!(error["details"], "validation");
    }

    assert_eq!(app.store.event_count(), 0);
}

#[tokio::test]
async fn test_statistics_reflect_worker_runs_only() {
    let app = TestApp::new(true);
    app.search("10.0.0.1", "how", false, 0).await;

    assert_eq!(app.statistics().await, json!([]));

    let run = app.run_worker().await;
    assert_eq!(run["status"], "completed");
    assert_eq!(run["report"]["events"], 1);

    assert_eq!(
        app.statistics().await,
        json!([{
            "term": "how",
            "count": 1,
            "article_count": 3,
            "zero_article_count": 0
        }])
    );
}

#[tokio::test]
async fn test_zero_result_submissions() {
    let app = TestApp::new(true);
    for term in ["canvas", "roses", "straw", "canvas"] {
        assert_eq!(app.search("10.0.0.7", term, true, 50).await, StatusCode::OK);
    }
    app.run_worker().await;

    assert_eq!(
        app.statistics().await,
        json!([
            {"term": "canvas", "count": 2, "article_count": 0, "zero_article_count": 2},
            {"term": "roses", "count": 1, "article_count": 0, "zero_article_count": 1},
            {"term": "straw", "count": 1, "article_count": 0, "zero_article_count": 1}
        ])
    );
}

#[tokio::test]
async fn test_delete_redirects_and_clears_statistics() {
    let app = TestApp::new(true);
    app.search("10.0.0.1", "how do i cancel my", false, 3500).await;
    app.search("10.0.0.1", "how do i cancel my subscription", true, 50)
        .await;
    app.run_worker().await;
    assert_eq!(app.statistics().await.as_array().unwrap().len(), 2);

    let (status, location, _) = app
        .request(Method::DELETE, "/search/statistics", None)
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/search/statistics"));

    assert_eq!(app.statistics().await, json!([]));

    // already processed events are not folded again
    app.run_worker().await;
    assert_eq!(app.statistics().await, json!([]));
    assert_eq!(app.store.event_count(), 2);
}

#[tokio::test]
async fn test_forwarded_clients_are_separate_sessions() {
    let app = TestApp::new(true);
    app.search("10.0.0.1", "car", false, 10).await;
    app.search("10.0.0.2", "cart", false, 10).await;
    app.run_worker().await;

    let rows = app.statistics().await;
    let terms: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["term"].as_str().unwrap())
        .collect();
    assert_eq!(terms, vec!["car", "cart"]);
}

#[tokio::test]
async fn test_untrusted_forwarded_header_uses_peer_address() {
    let app = TestApp::new(false).behind_peer(SocketAddr::from(([192, 168, 1, 20], 50123)));
    app.search("10.0.0.1", "car", false, 10).await;
    app.search("10.0.0.2", "cart", false, 10).await;
    app.run_worker().await;

    let rows = app.statistics().await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["term"], "cart");
}

#[tokio::test]
async fn test_oracle_outage_returns_service_unavailable() {
    let app = TestApp::new(true);
    app.store.set_oracle_available(false);

    let (status, _, body) = app
        .request(Method::GET, "/search?term=how", Some("10.0.0.1"))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let error: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(error["details"], "oracle");
    assert_eq!(app.store.event_count(), 0);

    app.store.set_oracle_available(true);
    app.run_worker().await;
    assert_eq!(app.statistics().await, json!([]));
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new(true);
    let (status, _, body) = app.request(Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["version"], searchlog_serve::VERSION);
}
