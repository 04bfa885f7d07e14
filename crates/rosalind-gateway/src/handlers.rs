// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rosalind_core::{
    GovernanceMode, HealthStatus, JobStatus, PluginAdapter, RoutingRequest, RoutingResult, StageJob,
};
use rosalind_router::DispatchTarget;
use rosalind_security::GovernanceDecision;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Request body for POST /v1/dispatch.
#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    #[serde(default)]
    pub task_type: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub mode: Option<GovernanceMode>,
    /// Accepted for compatibility; budgets are not enforced at dispatch.
    #[serde(default)]
    pub budgets: Option<Value>,
}

/// Response body for POST /v1/dispatch.
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    #[serde(flatten)]
    pub target: DispatchTarget,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Request body for POST /v1/route.
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    #[serde(flatten)]
    pub request: RoutingRequest,
    #[serde(default)]
    pub mode: Option<GovernanceMode>,
}

/// Response body for POST /v1/route.
#[derive(Debug, Serialize)]
pub struct RouteResponse {
    #[serde(flatten)]
    pub result: RoutingResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Request body for POST /stages/{stage}/jobs.
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub workflow_id: Uuid,
    #[serde(default = "empty_object")]
    pub inputs: Value,
    #[serde(default)]
    pub mode: Option<GovernanceMode>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Response body for POST /stages/{stage}/jobs.
#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: Uuid,
    pub stage: u32,
    pub status: JobStatus,
}

/// Response body for GET /stages/{stage}/jobs/{job_id}/status.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub stage: u32,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl From<StageJob> for JobStatusResponse {
    fn from(job: StageJob) -> Self {
        Self {
            job_id: job.job_id,
            stage: job.stage,
            status: job.status,
            progress: job.progress,
            result: job.result,
            error: job.failure_reason,
            created_at: job.created_at,
            processed_at: job.processed_at,
            finished_at: job.finished_at,
        }
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    /// Binary version.
    pub version: String,
    /// Seconds since the gateway state was built.
    pub uptime_secs: u64,
    /// Storage health: "ok" or "unavailable".
    pub storage: String,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    // The rejection text can quote the payload, so it is not forwarded.
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| {
            ApiError::validation(format!(
                "malformed request body ({})",
                rejection.status().as_u16()
            ))
        })
}

fn path<T>(params: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    params
        .map(|Path(params)| params)
        .map_err(|_| ApiError::validation("malformed path parameter"))
}

fn admit(decision: GovernanceDecision) -> Result<Option<String>, ApiError> {
    if decision.allowed {
        Ok(decision.warning)
    } else {
        Err(ApiError::phi_blocked(decision.reason))
    }
}

/// POST /v1/dispatch
///
/// Resolves a task type to an agent service or a model tier. Inputs are
/// PHI-gated under the effective governance mode first.
pub async fn post_dispatch(
    State(state): State<GatewayState>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let request = body(payload)?;
    if request.request_id.trim().is_empty() {
        return Err(ApiError::validation("request_id is required"));
    }
    if request.task_type.trim().is_empty() {
        return Err(ApiError::validation("task_type is required"));
    }
    if !(request.inputs.is_object() || request.inputs.is_null()) {
        return Err(ApiError::validation("inputs must be a JSON object"));
    }

    let mode = state.effective_mode(request.mode);
    let warning = admit(state.gate.check_json(&request.inputs, mode))?;
    let target = state.dispatch.resolve(request.task_type.trim())?;

    info!(
        request_id = %request.request_id,
        task_type = %request.task_type.trim(),
        %mode,
        "dispatch resolved"
    );
    Ok(Json(DispatchResponse {
        target,
        request_id: request.request_id,
        warning,
    }))
}

/// POST /v1/route
///
/// Routes a prompt through the tier ladder and returns the result, including
/// a failed quality gate when no tier passed.
pub async fn post_route(
    State(state): State<GatewayState>,
    payload: Result<Json<RouteRequest>, JsonRejection>,
) -> Result<Json<RouteResponse>, ApiError> {
    let RouteRequest { request, mode } = body(payload)?;
    if request.prompt.trim().is_empty() {
        return Err(ApiError::validation("prompt is required"));
    }
    if request.max_tokens == Some(0) {
        return Err(ApiError::validation("max_tokens must be positive"));
    }

    let mode = state.effective_mode(mode);
    let text = match &request.system_prompt {
        Some(system) => format!("{system}\n{}", request.prompt),
        None => request.prompt.clone(),
    };
    let warning = admit(state.gate.check(&text, mode))?;

    let result = state.router.route(&request).await?;
    info!(
        task_type = %request.task_type,
        tier = %result.routing.tier,
        passed = result.quality_gate.passed,
        "route completed"
    );
    Ok(Json(RouteResponse { result, warning }))
}

/// POST /stages/{stage}/jobs
pub async fn post_stage_job(
    State(state): State<GatewayState>,
    stage: Result<Path<u32>, PathRejection>,
    payload: Result<Json<EnqueueRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let stage = path(stage)?;
    let request = body(payload)?;
    if !state.stages.contains(&stage) {
        return Err(ApiError::validation(format!("stage {stage} has no agent route")));
    }

    let job = state
        .queue
        .enqueue(stage, request.workflow_id, request.inputs, request.mode)
        .await?;

    let response = EnqueueResponse {
        job_id: job.job_id,
        stage: job.stage,
        status: job.status,
    };
    Ok((StatusCode::ACCEPTED, Json(response)).into_response())
}

/// GET /stages/{stage}/jobs/{job_id}/status
pub async fn get_stage_job_status(
    State(state): State<GatewayState>,
    params: Result<Path<(u32, Uuid)>, PathRejection>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let (stage, job_id) = path(params)?;
    let job = state.queue.get_status(job_id).await?;
    if job.stage != stage {
        return Err(ApiError::not_found(format!(
            "stage job {job_id} not found for stage {stage}"
        )));
    }
    Ok(Json(job.into()))
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let storage = match state.storage().health_check().await {
        Ok(HealthStatus::Healthy) => "ok",
        Ok(HealthStatus::Degraded(_)) => "degraded",
        Ok(HealthStatus::Unhealthy(_)) | Err(_) => {
            warn!("storage health check failed");
            "unavailable"
        }
    };
    Json(HealthResponse {
        status: if storage == "ok" { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        storage: storage.to_string(),
    })
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when the exporter is disabled.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            render(),
        )
            .into_response(),
        None => ApiError::not_found("metrics exporter disabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosalind_core::{QualityGateSummary, RoutingInfo, TaskType, Tier, UsageInfo};
    use serde_json::json;

    #[test]
    fn dispatch_request_tolerates_missing_fields() {
        let req: DispatchRequest = serde_json::from_value(json!({"task_type": "CLASSIFY"})).unwrap();
        assert_eq!(req.task_type, "CLASSIFY");
        assert!(req.request_id.is_empty());
        assert!(req.inputs.is_null());
        assert!(req.mode.is_none());
    }

    #[test]
    fn dispatch_response_flattens_target() {
        let resp = DispatchResponse {
            target: DispatchTarget::Agent {
                agent_name: "agent-stage2-lit".into(),
                agent_url: "http://agent-stage2-lit:8010".into(),
            },
            request_id: "r-1".into(),
            warning: None,
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({
                "dispatch_type": "agent",
                "agent_name": "agent-stage2-lit",
                "agent_url": "http://agent-stage2-lit:8010",
                "request_id": "r-1",
            })
        );
    }

    #[test]
    fn route_request_reads_mode_beside_routing_fields() {
        let req: RouteRequest = serde_json::from_value(json!({
            "task_type": "SUMMARIZE",
            "prompt": "abstract",
            "force_tier": "MINI",
            "mode": "LIVE",
        }))
        .unwrap();
        assert_eq!(req.request.task_type, TaskType::Summarize);
        assert_eq!(req.request.force_tier, Some(Tier::Mini));
        assert_eq!(req.mode, Some(GovernanceMode::Live));
    }

    #[test]
    fn route_response_carries_warning_only_when_present() {
        let result = RoutingResult {
            content: "ok".into(),
            routing: RoutingInfo {
                provider: "anthropic".into(),
                model: "claude-haiku-4-5".into(),
                tier: Tier::Mini,
                task_type: TaskType::Summarize,
                latency_ms: 12,
            },
            usage: UsageInfo {
                input_tokens: 1,
                output_tokens: 2,
                total_tokens: 3,
                estimated_cost_usd: 0.0,
            },
            quality_gate: QualityGateSummary {
                passed: true,
                score: 1.0,
                checks: vec![],
                recommendations: vec![],
            },
            tiers_tried: vec![Tier::Mini],
        };
        let value = serde_json::to_value(RouteResponse {
            result,
            warning: None,
        })
        .unwrap();
        assert_eq!(value["routing"]["tier"], "MINI");
        assert!(value.get("warning").is_none());
    }

    #[test]
    fn status_response_omits_absent_fields() {
        let value = serde_json::to_value(JobStatusResponse {
            job_id: Uuid::nil(),
            stage: 2,
            status: JobStatus::Queued,
            progress: 0,
            result: None,
            error: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
            processed_at: None,
            finished_at: None,
        })
        .unwrap();
        assert_eq!(value["status"], "queued");
        assert!(value.get("result").is_none());
        assert!(value.get("finished_at").is_none());
    }
}
