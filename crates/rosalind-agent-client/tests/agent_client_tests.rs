// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the agent client against mocked downstreams.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rosalind_agent_client::{
    AgentClient, AuditEntry, AuditSink, ClientOptions, RequestOptions, target_key,
};
use rosalind_resilience::{BreakerConfig, CircuitState};
use rosalind_security::SsrfPolicy;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingSink(Mutex<Vec<AuditEntry>>);

impl RecordingSink {
    fn entries(&self) -> Vec<AuditEntry> {
        self.0.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingSink {
    fn record(&self, entry: &AuditEntry) {
        self.0.lock().unwrap().push(entry.clone());
    }
}

fn client_with(threshold: u32, sink: Arc<RecordingSink>) -> AgentClient {
    AgentClient::new(ClientOptions {
        timeout: Duration::from_secs(5),
        breaker: BreakerConfig {
            failure_threshold: threshold,
            reset_timeout: Duration::from_secs(60),
            half_open_max_trials: 1,
            half_open_success_threshold: 1,
        },
        policy: SsrfPolicy::new(&["127.0.0.1".to_string()], &[]),
        resolve_guard: true,
        audit: sink,
    })
    .unwrap()
}

#[tokio::test]
async fn success_parses_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "items": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let client = client_with(5, Arc::clone(&sink));
    let resp = client
        .post_sync(&server.uri(), "/run", &json!({"query": "statins"}), None)
        .await;

    assert!(resp.success);
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.data, Some(json!({"ok": true, "items": 3})));
    assert!(resp.error.is_none());

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "/run");
    assert_eq!(entries[0].status_code, 200);
}

#[tokio::test]
async fn text_body_becomes_string_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .mount(&server)
        .await;

    let client = client_with(5, Arc::default());
    let resp = client.post_sync(&server.uri(), "/run", &json!({}), None).await;
    assert_eq!(resp.data, Some(json!("accepted")));
}

#[tokio::test]
async fn private_and_local_urls_never_reach_the_transport() {
    let sink = Arc::new(RecordingSink::default());
    // No allowlist: every private literal is refused.
    let client = AgentClient::new(ClientOptions {
        audit: sink.clone(),
        ..ClientOptions::default()
    })
    .unwrap();

    for url in [
        "http://localhost:8080",
        "http://127.0.0.1",
        "http://10.0.0.1",
        "http://192.168.1.1",
        "http://x.local",
    ] {
        let started = Instant::now();
        let resp = client.post_sync(url, "/run", &json!({"a": 1}), None).await;
        assert!(!resp.success, "{url}");
        assert_eq!(resp.status_code, 400, "{url}");
        assert!(resp.error.unwrap().contains("SSRF blocked"), "{url}");
        assert!(started.elapsed() < Duration::from_millis(50), "{url}");
        // No breaker was consulted, so no target state exists.
        assert!(client.breaker_snapshot(&target_key(url).unwrap()).is_none());
    }
    assert_eq!(sink.entries().len(), 5);
}

#[tokio::test]
async fn malformed_url_is_invalid_not_blocked() {
    let client = client_with(5, Arc::default());
    let resp = client.post_sync("not a url", "/run", &json!({}), None).await;
    assert_eq!(resp.status_code, 400);
    let error = resp.error.unwrap();
    assert!(error.starts_with("Invalid URL"), "{error}");
}

#[tokio::test]
async fn slow_backend_times_out_with_408() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = client_with(5, Arc::default());
    let started = Instant::now();
    let resp = client
        .post_sync(
            &server.uri(),
            "/run",
            &json!({}),
            Some(&RequestOptions::with_timeout(Duration::from_millis(100))),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(resp.status_code, 408);
    assert!(resp.error.unwrap().contains("timeout"));

    let target = target_key(&server.uri()).unwrap();
    assert_eq!(client.breaker_snapshot(&target).unwrap().consecutive_failures, 1);
}

#[tokio::test]
async fn breaker_opens_after_threshold_and_short_circuits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "overloaded"})))
        // The fourth call must never arrive.
        .expect(3)
        .mount(&server)
        .await;

    let client = client_with(3, Arc::default());
    for _ in 0..3 {
        let resp = client.post_sync(&server.uri(), "/run", &json!({}), None).await;
        assert_eq!(resp.status_code, 503);
        assert_eq!(resp.error.as_deref(), Some("overloaded"));
    }

    let target = target_key(&server.uri()).unwrap();
    assert_eq!(client.breaker_state(&target), CircuitState::Open);

    let resp = client.post_sync(&server.uri(), "/run", &json!({}), None).await;
    assert_eq!(resp.status_code, 503);
    assert_eq!(resp.error.as_deref(), Some("circuit open"));
    assert!(resp.is_transient());
}

#[tokio::test]
async fn client_errors_do_not_trip_the_breaker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"error": "bad stage"})))
        .mount(&server)
        .await;

    let client = client_with(2, Arc::default());
    for _ in 0..4 {
        let resp = client.post_sync(&server.uri(), "/run", &json!({}), None).await;
        assert_eq!(resp.status_code, 422);
        assert!(!resp.is_transient());
    }
    let target = target_key(&server.uri()).unwrap();
    assert_eq!(client.breaker_state(&target), CircuitState::Closed);
}

#[tokio::test]
async fn connection_refused_reports_status_zero() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = client_with(5, Arc::default());
    let base = format!("http://127.0.0.1:{port}");
    let resp = client.post_sync(&base, "/run", &json!({}), None).await;

    assert!(!resp.success);
    assert_eq!(resp.status_code, 0);
    assert!(resp.error.is_some());
    assert_eq!(
        client
            .breaker_snapshot(&format!("127.0.0.1:{port}"))
            .unwrap()
            .consecutive_failures,
        1
    );
}

#[tokio::test]
async fn breakers_are_isolated_per_target_and_overridable() {
    let sick = MockServer::start().await;
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&healthy)
        .await;

    let client = client_with(5, Arc::default());
    let sick_target = target_key(&sick.uri()).unwrap();
    client.force_open(&sick_target);

    let resp = client.post_sync(&sick.uri(), "/run", &json!({}), None).await;
    assert_eq!(resp.error.as_deref(), Some("circuit open"));
    let resp = client.post_sync(&healthy.uri(), "/run", &json!({}), None).await;
    assert!(resp.success);

    client.force_close(&sick_target);
    assert_eq!(client.breaker_state(&sick_target), CircuitState::Closed);
    client.reset_breakers();
    assert!(client.breaker_snapshots().is_empty());
}

#[tokio::test]
async fn echoed_phi_is_scrubbed_from_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("rejected: Maria Gonzalez, DOB 04/12/1961"),
        )
        .mount(&server)
        .await;

    let client = client_with(5, Arc::default());
    let payloads = [
        json!({"name": "Maria Gonzalez", "dob": "04/12/1961"}),
        json!({"notes": ["Maria Gonzalez", {"dob": "04/12/1961"}]}),
    ];
    for body in payloads {
        let resp = client.post_sync(&server.uri(), "/run", &body, None).await;
        let error = resp.error.unwrap();
        assert!(!error.contains("Maria"), "{error}");
        assert!(!error.contains("Gonzalez"), "{error}");
        assert!(!error.contains("04/12/1961"), "{error}");
    }
}
