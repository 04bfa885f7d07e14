// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end HTTP scenarios against the gateway router.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use rosalind_config::model::RoutingConfig;
use rosalind_core::traits::provider::ProviderAdapter;
use rosalind_core::{GovernanceMode, StorageAdapter, Tier};
use rosalind_gateway::{GatewayState, build_router};
use rosalind_router::{ModelRouter, ProviderRegistry, RouterSettings, TierProvider};
use rosalind_test_utils::{MockExecutor, MockProvider, MockReply, TestHarness};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

const SUMMARY: &str = "Pooled estimates from nine cohorts indicate a modest protective \
                       association between statin use and dementia incidence.";

struct App {
    harness: TestHarness,
    router: Router,
}

fn registry(replies: &[(Tier, Vec<MockReply>)]) -> ProviderRegistry {
    replies
        .iter()
        .fold(ProviderRegistry::new(), |registry, (tier, replies)| {
            let mock = Arc::new(MockProvider::with_replies(replies.clone()));
            registry.with(
                *tier,
                TierProvider {
                    provider: "mock".into(),
                    model: format!("mock-{}", tier.to_string().to_lowercase()),
                    max_tokens: 256,
                    adapter: mock as Arc<dyn ProviderAdapter>,
                },
            )
        })
}

async fn app_with(
    mode: GovernanceMode,
    providers: ProviderRegistry,
    metrics: Option<Arc<dyn Fn() -> String + Send + Sync>>,
) -> App {
    let mut harness = TestHarness::builder()
        .with_governance_mode(mode)
        .build()
        .await
        .unwrap();
    harness.config.stream.poll_interval_ms = 10;
    harness.config.stream.max_duration_secs = 5;

    let model_router = ModelRouter::from_config(&RoutingConfig::default(), providers).with_settings(
        RouterSettings {
            max_escalations: 2,
            same_tier_retries: 0,
            retry_backoff: Duration::from_millis(1),
        },
    );
    let state = GatewayState::new(
        &harness.config,
        Arc::clone(&harness.storage),
        Arc::new(model_router),
        metrics,
    );
    App {
        router: build_router(state),
        harness,
    }
}

async fn app() -> App {
    app_with(GovernanceMode::Demo, ProviderRegistry::new(), None).await
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

/// One parsed SSE message: (id, event, data). Comments are returned with
/// event `":"`.
fn parse_sse(text: &str) -> Vec<(Option<i64>, String, Value)> {
    text.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let mut id = None;
            let mut event = String::from("message");
            let mut data = Value::Null;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("id: ") {
                    id = v.parse().ok();
                } else if let Some(v) = line.strip_prefix("event: ") {
                    event = v.to_string();
                } else if let Some(v) = line.strip_prefix("data: ") {
                    data = serde_json::from_str(v).unwrap_or(Value::Null);
                } else if line.starts_with(':') {
                    event = ":".to_string();
                }
            }
            (id, event, data)
        })
        .collect()
}

async fn stream(router: &Router, uri: &str) -> (StatusCode, Vec<(Option<i64>, String, Value)>) {
    let response = router.clone().oneshot(get(uri)).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, parse_sse(&String::from_utf8_lossy(&bytes)))
}

// --- dispatch ---

#[tokio::test]
async fn dispatch_configured_agent_task() {
    let app = app().await;
    let (status, body) = send(
        &app.router,
        post(
            "/v1/dispatch",
            json!({
                "task_type": "STAGE_2_LITERATURE_REVIEW",
                "request_id": "test-001",
                "inputs": {"query": "statins and dementia"},
                "mode": "DEMO",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "dispatch_type": "agent",
            "agent_name": "agent-stage2-lit",
            "agent_url": "http://agent-stage2-lit:8010",
            "request_id": "test-001",
        })
    );
}

#[tokio::test]
async fn dispatch_model_task_reports_tier_and_provider() {
    let app = app().await;
    let (status, body) = send(
        &app.router,
        post(
            "/v1/dispatch",
            json!({"task_type": "CLASSIFY", "request_id": "r-2", "inputs": {}, "mode": "DEMO"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dispatch_type"], "model");
    assert_eq!(body["tier"], "NANO");
    assert_eq!(body["provider"], "openai");
    assert_eq!(body["model"], "gpt-4.1-nano");
    assert_eq!(body["request_id"], "r-2");
}

#[tokio::test]
async fn dispatch_distinguishes_unknown_from_unmapped_task_types() {
    let app = app().await;

    let (status, body) = send(
        &app.router,
        post(
            "/v1/dispatch",
            json!({"task_type": "TRANSLATE_ABSTRACT", "request_id": "r-3", "inputs": {}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNSUPPORTED_TASK_TYPE");

    let (status, body) = send(
        &app.router,
        post(
            "/v1/dispatch",
            json!({"task_type": "STAGE_5_PEER_REVIEW", "request_id": "r-4", "inputs": {}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "AGENT_NOT_CONFIGURED");
    assert!(body["message"].as_str().unwrap().contains("STAGE_5_PEER_REVIEW"));
}

#[tokio::test]
async fn dispatch_validates_required_fields_and_body() {
    let app = app().await;

    let (status, body) = send(
        &app.router,
        post("/v1/dispatch", json!({"task_type": "CLASSIFY", "request_id": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app.router,
        post("/v1/dispatch", json!({"task_type": "", "request_id": "r-5"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let malformed = Request::builder()
        .method("POST")
        .uri("/v1/dispatch")
        .header("content-type", "application/json")
        .body(Body::from("{\"task_type\": "))
        .unwrap();
    let (status, body) = send(&app.router, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn demo_mode_blocks_ssn_without_echoing_it() {
    let app = app().await;
    let (status, body) = send(
        &app.router,
        post(
            "/v1/dispatch",
            json!({
                "task_type": "STAGE_2_LITERATURE_REVIEW",
                "request_id": "r-6",
                "inputs": {"notes": "patient SSN 123-45-6789"},
                "mode": "DEMO",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "PHI_BLOCKED");
    assert!(!body.to_string().contains("123-45-6789"));
}

#[tokio::test]
async fn request_mode_can_only_tighten_governance() {
    let app = app_with(GovernanceMode::Live, ProviderRegistry::new(), None).await;
    let inputs = json!({"contact": "call 555-867-5309 after the visit"});

    let (status, _) = send(
        &app.router,
        post(
            "/v1/dispatch",
            json!({"task_type": "CLASSIFY", "request_id": "r-7", "inputs": inputs, "mode": "LIVE"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app.router,
        post(
            "/v1/dispatch",
            json!({"task_type": "CLASSIFY", "request_id": "r-8", "inputs": inputs, "mode": "DEMO"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "PHI_BLOCKED");
}

// --- route ---

#[tokio::test]
async fn route_returns_routing_result() {
    let providers = registry(&[(Tier::Mini, vec![MockReply::text(SUMMARY)])]);
    let app = app_with(GovernanceMode::Demo, providers, None).await;

    let (status, body) = send(
        &app.router,
        post(
            "/v1/route",
            json!({"task_type": "SUMMARIZE", "prompt": "Summarize the pooled analysis."}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], SUMMARY);
    assert_eq!(body["routing"]["tier"], "MINI");
    assert_eq!(body["routing"]["task_type"], "SUMMARIZE");
    assert_eq!(body["quality_gate"]["passed"], true);
    assert_eq!(body["usage"]["total_tokens"], 30);
}

#[tokio::test]
async fn route_errors_are_typed() {
    let app = app().await;
    let (status, body) = send(
        &app.router,
        post("/v1/route", json!({"task_type": "SUMMARIZE", "prompt": "abstract"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "PROVIDER_UNAVAILABLE");

    let providers = registry(&[
        (Tier::Mini, vec![MockReply::Fail("patient Jane Roe".into())]),
        (Tier::Frontier, vec![MockReply::Fail("patient Jane Roe".into())]),
    ]);
    let app = app_with(GovernanceMode::Demo, providers, None).await;
    let (status, body) = send(
        &app.router,
        post("/v1/route", json!({"task_type": "SUMMARIZE", "prompt": "abstract"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "ROUTING_EXHAUSTED");
    assert!(!body.to_string().contains("Jane Roe"));

    let (status, body) = send(
        &app.router,
        post("/v1/route", json!({"task_type": "TRANSLATE", "prompt": "abstract"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn route_prompt_is_phi_gated() {
    let providers = registry(&[(Tier::Mini, vec![MockReply::text(SUMMARY)])]);
    let app = app_with(GovernanceMode::Demo, providers, None).await;
    let (status, body) = send(
        &app.router,
        post(
            "/v1/route",
            json!({"task_type": "SUMMARIZE", "prompt": "MRN: 12345678 presented with chest pain"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "PHI_BLOCKED");
}

// --- stage jobs ---

#[tokio::test]
async fn enqueue_then_read_status() {
    let app = app().await;
    let workflow_id = Uuid::new_v4();
    let (status, body) = send(
        &app.router,
        post(
            "/stages/2/jobs",
            json!({"workflow_id": workflow_id, "inputs": {"query": "statins"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["stage"], 2);
    assert_eq!(body["status"], "queued");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app.router, get(&format!("/stages/2/jobs/{job_id}/status"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job_id"], job_id);
    assert_eq!(body["status"], "queued");
    assert_eq!(body["progress"], 0);
    assert!(body["created_at"].is_string());
    assert!(body.get("finished_at").is_none());

    let (status, body) = send(&app.router, get(&format!("/stages/3/jobs/{job_id}/status"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(
        &app.router,
        get(&format!("/stages/2/jobs/{}/status", Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app.router, get("/stages/2/jobs/not-a-uuid/status")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn enqueue_rejects_unrouted_stage_and_phi() {
    let app = app().await;
    let (status, body) = send(
        &app.router,
        post("/stages/9/jobs", json!({"workflow_id": Uuid::new_v4(), "inputs": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app.router,
        post(
            "/stages/2/jobs",
            json!({"workflow_id": Uuid::new_v4(), "inputs": {"ssn": "123-45-6789"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "PHI_BLOCKED");
}

#[tokio::test]
async fn stream_replays_stored_events_until_done() {
    let app = app().await;
    let job_id = Uuid::new_v4();
    for (name, data) in [
        ("started", json!({})),
        ("progress", json!({"progress": 50})),
        ("progress", json!({"progress": 90})),
        ("done", json!({"articles": 14})),
    ] {
        app.harness.storage.append_event(job_id, name, data).await.unwrap();
    }

    let (status, messages) = stream(&app.router, &format!("/stages/2/jobs/{job_id}/stream")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages.len(), 4, "{messages:?}");
    let ids: Vec<Option<i64>> = messages.iter().map(|(id, _, _)| *id).collect();
    assert_eq!(ids, vec![Some(0), Some(1), Some(2), Some(3)]);
    assert_eq!(messages[1].2, json!({"progress": 50}));
    assert_eq!(messages[3].1, "done");
    assert_eq!(messages[3].2, json!({"articles": 14}));
}

#[tokio::test]
async fn stream_follows_a_worker_to_completion() {
    let app = app().await;
    let job = app
        .harness
        .queue
        .enqueue(2, Uuid::new_v4(), json!({"query": "statins"}), None)
        .await
        .unwrap();

    let worker = app
        .harness
        .worker(Arc::new(MockExecutor::with_outcomes(vec![Ok(json!({"included": 3}))])));
    let run = tokio::spawn(async move { worker.run_once().await });

    let (status, messages) = stream(
        &app.router,
        &format!("/stages/2/jobs/{}/stream", job.job_id),
    )
    .await;
    run.await.unwrap().unwrap();

    assert_eq!(status, StatusCode::OK);
    let events: Vec<(i64, String)> = messages
        .iter()
        .filter_map(|(id, event, _)| id.map(|id| (id, event.clone())))
        .collect();
    assert_eq!(
        events,
        vec![
            (0, "queued".to_string()),
            (1, "started".to_string()),
            (2, "progress".to_string()),
            (3, "completed".to_string()),
        ]
    );
    let last = messages.last().unwrap();
    assert_eq!(last.2, json!({"result": {"included": 3}}));

    let (status, _) = stream(
        &app.router,
        &format!("/stages/4/jobs/{}/stream", job.job_id),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn idle_stream_sends_keepalives_then_timeout() {
    let mut harness_app = app().await;
    harness_app.harness.config.stream.max_duration_secs = 1;
    let state = GatewayState::new(
        &harness_app.harness.config,
        Arc::clone(&harness_app.harness.storage),
        Arc::new(ModelRouter::from_config(
            &RoutingConfig::default(),
            ProviderRegistry::new(),
        )),
        None,
    );
    harness_app.router = build_router(state);

    let (status, messages) = stream(
        &harness_app.router,
        &format!("/stages/2/jobs/{}/stream", Uuid::new_v4()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(messages.iter().any(|(_, event, _)| event == ":"));
    let last = messages.last().unwrap();
    assert_eq!(last.1, "timeout");
    assert!(last.0.is_none());
}

// --- health / metrics ---

#[tokio::test]
async fn health_reports_storage() {
    let app = app().await;
    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn metrics_endpoint_follows_exporter() {
    let app = app().await;
    let (status, _) = send(&app.router, get("/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let render: Arc<dyn Fn() -> String + Send + Sync> =
        Arc::new(|| "rosalind_stage_jobs_total{outcome=\"completed\"} 1\n".to_string());
    let app = app_with(GovernanceMode::Demo, ProviderRegistry::new(), Some(render)).await;
    let (status, body) = send(&app.router, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("rosalind_stage_jobs_total"));
}
