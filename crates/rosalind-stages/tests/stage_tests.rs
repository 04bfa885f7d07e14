// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue, worker, and agent executor tests against a temp SQLite store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rosalind_agent_client::{AgentClient, ClientOptions};
use rosalind_config::model::{
    GovernanceConfig, QueueConfig, RosalindConfig, StageRouteConfig, StorageConfig,
};
use rosalind_core::{
    AdapterType, GovernanceMode, HealthStatus, JobStatus, NewStageJob, PluginAdapter,
    RosalindError, StageJob, StorageAdapter, StreamEvent,
};
use rosalind_security::SsrfPolicy;
use rosalind_stages::{
    AgentExecutor, JobOutcome, ProgressReporter, StageExecutor, StageFailure, StageQueue,
    StageWorker, WorkerSettings,
};
use rosalind_storage::SqliteStorage;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn storage(dir: &TempDir) -> Arc<dyn StorageAdapter> {
    let storage = SqliteStorage::new(StorageConfig {
        database_path: dir.path().join("stages.db").to_string_lossy().into_owned(),
        wal_mode: true,
    });
    storage.initialize().await.unwrap();
    Arc::new(storage)
}

fn fast_queue(max_attempts: u32) -> QueueConfig {
    QueueConfig {
        max_attempts,
        backoff_base_ms: 1,
        backoff_max_ms: 1,
        poll_interval_ms: 10,
        concurrency: 2,
        ..QueueConfig::default()
    }
}

fn live() -> GovernanceConfig {
    GovernanceConfig {
        mode: "LIVE".into(),
        ..GovernanceConfig::default()
    }
}

/// Executor that plays back scripted outcomes, then succeeds.
#[derive(Default)]
struct Scripted {
    outcomes: Mutex<VecDeque<Result<Value, StageFailure>>>,
}

impl Scripted {
    fn new(outcomes: Vec<Result<Value, StageFailure>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
        }
    }
}

#[async_trait]
impl StageExecutor for Scripted {
    async fn execute(
        &self,
        _job: &StageJob,
        progress: &ProgressReporter,
    ) -> Result<Value, StageFailure> {
        progress.report(50).await.unwrap();
        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(json!({"ok": true})))
    }
}

async fn event_names(storage: &Arc<dyn StorageAdapter>, job_id: Uuid) -> Vec<String> {
    storage
        .events_after(job_id, None)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event)
        .collect()
}

#[tokio::test]
async fn enqueue_persists_job_and_queued_event() {
    let dir = TempDir::new().unwrap();
    let storage = storage(&dir).await;
    let queue = StageQueue::new(Arc::clone(&storage), &fast_queue(3), &live());

    let workflow = Uuid::new_v4();
    let job = queue
        .enqueue(2, workflow, json!({"query": "statin trials"}), None)
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.stage, 2);
    assert_eq!(job.max_attempts, 3);

    let status = queue.get_status(job.job_id).await.unwrap();
    assert_eq!(status.workflow_id, workflow);
    assert_eq!(event_names(&storage, job.job_id).await, vec!["queued"]);

    let missing = queue.get_status(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, RosalindError::NotFound { .. }));
}

/// Storage whose event log rejects every append; everything else delegates.
struct EventLogDown {
    inner: Arc<dyn StorageAdapter>,
}

#[async_trait]
impl PluginAdapter for EventLogDown {
    fn name(&self) -> &str {
        "event-log-down"
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RosalindError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), RosalindError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl StorageAdapter for EventLogDown {
    async fn initialize(&self) -> Result<(), RosalindError> {
        self.inner.initialize().await
    }

    async fn close(&self) -> Result<(), RosalindError> {
        self.inner.close().await
    }

    async fn enqueue_job(&self, job: NewStageJob) -> Result<StageJob, RosalindError> {
        self.inner.enqueue_job(job).await
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<StageJob>, RosalindError> {
        self.inner.get_job(job_id).await
    }

    async fn claim_next_job(&self, lease: Duration) -> Result<Option<StageJob>, RosalindError> {
        self.inner.claim_next_job(lease).await
    }

    async fn complete_job(&self, job_id: Uuid, result: Value) -> Result<(), RosalindError> {
        self.inner.complete_job(job_id, result).await
    }

    async fn fail_job(
        &self,
        job_id: Uuid,
        reason: &str,
        retryable: bool,
        backoff: Duration,
    ) -> Result<JobStatus, RosalindError> {
        self.inner.fail_job(job_id, reason, retryable, backoff).await
    }

    async fn set_job_progress(&self, job_id: Uuid, progress: u8) -> Result<(), RosalindError> {
        self.inner.set_job_progress(job_id, progress).await
    }

    async fn prune_finished_jobs(
        &self,
        keep_completed: u32,
        keep_failed: u32,
    ) -> Result<u64, RosalindError> {
        self.inner.prune_finished_jobs(keep_completed, keep_failed).await
    }

    async fn append_event(
        &self,
        _job_id: Uuid,
        _event: &str,
        _data: Value,
    ) -> Result<i64, RosalindError> {
        Err(RosalindError::Internal("event log unavailable".into()))
    }

    async fn events_after(
        &self,
        job_id: Uuid,
        after_seq: Option<i64>,
    ) -> Result<Vec<StreamEvent>, RosalindError> {
        self.inner.events_after(job_id, after_seq).await
    }
}

#[tokio::test]
async fn enqueue_writes_row_and_queued_event_together() {
    let dir = TempDir::new().unwrap();
    let inner = storage(&dir).await;
    let storage: Arc<dyn StorageAdapter> = Arc::new(EventLogDown {
        inner: Arc::clone(&inner),
    });
    let queue = StageQueue::new(Arc::clone(&storage), &fast_queue(3), &live());

    let job = queue
        .enqueue(2, Uuid::new_v4(), json!({"query": "statins"}), None)
        .await
        .unwrap();

    // Exactly one runnable job, and it is the one the caller was told about.
    let claimed = storage
        .claim_next_job(Duration::from_secs(30))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.job_id, job.job_id);
    assert!(
        storage
            .claim_next_job(Duration::from_secs(30))
            .await
            .unwrap()
            .is_none()
    );

    let events = inner.events_after(job.job_id, None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!((events[0].seq, events[0].event.as_str()), (0, "queued"));
    assert_eq!(events[0].data["stage"], 2);
}

#[tokio::test]
async fn phi_inputs_are_refused_before_persisting() {
    let dir = TempDir::new().unwrap();
    let storage = storage(&dir).await;
    let queue = StageQueue::new(
        Arc::clone(&storage),
        &fast_queue(3),
        &GovernanceConfig::default(),
    );

    let err = queue
        .enqueue(2, Uuid::new_v4(), json!({"note": "SSN 123-45-6789"}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RosalindError::Security(_)));
    assert!(!err.to_string().contains("123-45-6789"));

    let err = queue
        .enqueue(2, Uuid::new_v4(), json!(["not", "an", "object"]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RosalindError::Validation(_)));

    assert!(
        storage
            .claim_next_job(Duration::from_secs(5))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn request_mode_can_only_tighten_governance() {
    let dir = TempDir::new().unwrap();
    let storage = storage(&dir).await;
    let queue = StageQueue::new(storage, &fast_queue(3), &live());
    // A phone number alone is below the LIVE block threshold.
    let inputs = json!({"contact": "call 555-867-5309"});

    assert!(
        queue
            .enqueue(2, Uuid::new_v4(), inputs.clone(), Some(GovernanceMode::Live))
            .await
            .is_ok()
    );
    assert!(
        queue
            .enqueue(2, Uuid::new_v4(), inputs, Some(GovernanceMode::Demo))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn worker_completes_job_with_progress() {
    let dir = TempDir::new().unwrap();
    let storage = storage(&dir).await;
    let queue = StageQueue::new(Arc::clone(&storage), &fast_queue(3), &live());
    let job = queue
        .enqueue(3, Uuid::new_v4(), json!({"studies": 12}), None)
        .await
        .unwrap();

    let executor = Arc::new(Scripted::new(vec![Ok(json!({"pooled_effect": 0.42}))]));
    let worker = StageWorker::new(
        Arc::clone(&storage),
        executor,
        WorkerSettings::from_config(&fast_queue(3)),
    );

    assert_eq!(worker.run_once().await.unwrap(), Some(JobOutcome::Completed));
    assert_eq!(worker.run_once().await.unwrap(), None);

    let done = queue.get_status(job.job_id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert_eq!(done.result, Some(json!({"pooled_effect": 0.42})));
    assert!(done.finished_at.is_some());
    assert_eq!(
        event_names(&storage, job.job_id).await,
        vec!["queued", "started", "progress", "completed"]
    );
}

#[tokio::test]
async fn transient_failures_retry_until_attempts_run_out() {
    let dir = TempDir::new().unwrap();
    let storage = storage(&dir).await;
    let queue = StageQueue::new(Arc::clone(&storage), &fast_queue(2), &live());
    let job = queue
        .enqueue(2, Uuid::new_v4(), json!({"q": "x"}), None)
        .await
        .unwrap();

    let executor = Arc::new(Scripted::new(vec![
        Err(StageFailure::retryable("agent returned 503: overloaded")),
        Err(StageFailure::retryable("agent returned 503: overloaded")),
    ]));
    let worker = StageWorker::new(
        Arc::clone(&storage),
        executor,
        WorkerSettings::from_config(&fast_queue(2)),
    );

    assert_eq!(worker.run_once().await.unwrap(), Some(JobOutcome::Retrying));
    assert_eq!(
        queue.get_status(job.job_id).await.unwrap().status,
        JobStatus::Queued
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(worker.run_once().await.unwrap(), Some(JobOutcome::Failed));

    let failed = queue.get_status(job.job_id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.attempts, 2);
    assert_eq!(
        failed.failure_reason.as_deref(),
        Some("agent returned 503: overloaded")
    );
    let names = event_names(&storage, job.job_id).await;
    assert_eq!(names.iter().filter(|n| *n == "started").count(), 2);
    assert!(names.contains(&"retrying".to_string()));
    assert_eq!(names.last().map(String::as_str), Some("failed"));
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let storage = storage(&dir).await;
    let queue = StageQueue::new(Arc::clone(&storage), &fast_queue(3), &live());
    let job = queue
        .enqueue(2, Uuid::new_v4(), json!({"q": "x"}), None)
        .await
        .unwrap();

    let executor = Arc::new(Scripted::new(vec![Err(StageFailure::permanent(
        "agent returned 422: bad inputs",
    ))]));
    let worker = StageWorker::new(
        Arc::clone(&storage),
        executor,
        WorkerSettings::from_config(&fast_queue(3)),
    );

    assert_eq!(worker.run_once().await.unwrap(), Some(JobOutcome::Failed));
    let failed = queue.get_status(job.job_id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.attempts, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_pool_drains_queue_and_stops_on_cancel() {
    let dir = TempDir::new().unwrap();
    let storage = storage(&dir).await;
    let queue = StageQueue::new(Arc::clone(&storage), &fast_queue(3), &live());
    let mut ids = Vec::new();
    for n in 0..5 {
        let job = queue
            .enqueue(2, Uuid::new_v4(), json!({"n": n}), None)
            .await
            .unwrap();
        ids.push(job.job_id);
    }

    let worker = StageWorker::new(
        Arc::clone(&storage),
        Arc::new(Scripted::default()),
        WorkerSettings::from_config(&fast_queue(3)),
    );
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { worker.run(cancel).await }
    });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let mut all_done = true;
        for id in &ids {
            if queue.get_status(*id).await.unwrap().status != JobStatus::Completed {
                all_done = false;
            }
        }
        if all_done {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "jobs did not finish");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker stops after cancel")
        .unwrap()
        .unwrap();
}

fn agent_config(uri: &str) -> RosalindConfig {
    let mut config = RosalindConfig::default();
    config.agents.insert("agent-test".into(), uri.to_string());
    config.stages.insert(
        "7".into(),
        StageRouteConfig {
            agent: "agent-test".into(),
            path: "/run".into(),
        },
    );
    config
}

fn local_client() -> Arc<AgentClient> {
    Arc::new(
        AgentClient::new(ClientOptions {
            policy: SsrfPolicy::new(&["127.0.0.1".to_string()], &[]),
            ..ClientOptions::default()
        })
        .unwrap(),
    )
}

#[tokio::test]
async fn agent_executor_posts_job_and_classifies_failures() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let storage = storage(&dir).await;
    let queue = StageQueue::new(Arc::clone(&storage), &fast_queue(3), &live());
    let job = queue
        .enqueue(7, Uuid::new_v4(), json!({"topic": "statins"}), None)
        .await
        .unwrap();
    let claimed = storage
        .claim_next_job(Duration::from_secs(30))
        .await
        .unwrap()
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/run"))
        .and(body_partial_json(json!({
            "job_id": job.job_id,
            "stage": 7,
            "inputs": {"topic": "statins"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"articles": 31})))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let executor = AgentExecutor::from_config(&agent_config(&server.uri()), local_client());
    let reporter = ProgressReporter::new(Arc::clone(&storage), job.job_id);
    let result = executor.execute(&claimed, &reporter).await.unwrap();
    assert_eq!(result, json!({"articles": 31}));

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "busy"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    let failure = executor.execute(&claimed, &reporter).await.unwrap_err();
    assert!(failure.retryable);
    assert_eq!(failure.reason, "agent returned 503: busy");

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"error": "bad topic"})))
        .mount(&server)
        .await;
    let failure = executor.execute(&claimed, &reporter).await.unwrap_err();
    assert!(!failure.retryable);

    let unrouted = StageJob {
        stage: 99,
        ..claimed
    };
    let failure = executor.execute(&unrouted, &reporter).await.unwrap_err();
    assert!(!failure.retryable);
    assert!(failure.reason.contains("stage 99"));
}
