// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed API errors.
//!
//! Every failure leaves the gateway as `{code, message}` JSON with a status
//! chosen from the code. Messages are written here, never copied from a
//! provider or agent response.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rosalind_core::RosalindError;
use rosalind_router::{DispatchError, RoutingError};
use serde::Serialize;
use tracing::{debug, warn};

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unsupported_task_type(task_type: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "UNSUPPORTED_TASK_TYPE",
            format!("unsupported task type: {task_type}"),
        )
    }

    pub fn phi_blocked(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "PHI_BLOCKED", reason)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn agent_not_configured(task_type: &str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "AGENT_NOT_CONFIGURED",
            format!("no agent configured for task type {task_type}"),
        )
    }

    pub fn routing_exhausted(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "ROUTING_EXHAUSTED", message)
    }

    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_UNAVAILABLE", message)
    }

    pub fn storage() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "STORAGE_ERROR",
            "storage unavailable",
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "internal error",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!(status = self.status.as_u16(), code = self.code, "request failed");
        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RosalindError> for ApiError {
    fn from(err: RosalindError) -> Self {
        match err {
            RosalindError::Validation(message) => ApiError::validation(message),
            RosalindError::Security(reason) => ApiError::phi_blocked(reason),
            RosalindError::NotFound { kind, id } => ApiError::not_found(format!("{kind} {id} not found")),
            RosalindError::Transient { .. }
            | RosalindError::Timeout { .. }
            | RosalindError::CircuitOpen { .. }
            | RosalindError::Provider { .. } => {
                ApiError::provider_unavailable("downstream provider unavailable")
            }
            RosalindError::Storage { source } => {
                warn!(error = %source, "storage failure");
                ApiError::storage()
            }
            RosalindError::Config(_) | RosalindError::Internal(_) => {
                warn!(error = %err, "internal failure");
                ApiError::internal()
            }
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(message) => ApiError::validation(message),
            DispatchError::UnsupportedTaskType(task) => ApiError::unsupported_task_type(&task),
            DispatchError::AgentNotConfigured(task) => ApiError::agent_not_configured(&task),
            DispatchError::TierNotConfigured(task) => {
                ApiError::provider_unavailable(format!("no model tier configured for {task}"))
            }
        }
    }
}

impl From<RoutingError> for ApiError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::TierUnavailable { tier } => {
                ApiError::provider_unavailable(format!("tier {tier} is not configured"))
            }
            RoutingError::ProviderUnavailable { tier, .. } => {
                ApiError::provider_unavailable(format!("provider for tier {tier} unavailable"))
            }
            RoutingError::AllTiersExhausted { tiers_tried, .. } => {
                let tiers: Vec<String> = tiers_tried.iter().map(ToString::to_string).collect();
                ApiError::routing_exhausted(format!(
                    "all tiers exhausted ({})",
                    tiers.join(" -> ")
                ))
            }
        }
    }
}
