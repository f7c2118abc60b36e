//! API state, error mapping and the health check

use crate::enrichment::{
    ActivityAggregator, ChildIssueError, HierarchyLinker, HierarchyResolver, LinkError,
};
use crate::tracker::{TrackerClient, TrackerError};
use crate::AppState;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

/// Shared server state
pub struct ServerState {
    pub tracker: Arc<dyn TrackerClient>,
    pub aggregator: ActivityAggregator,
    pub resolver: HierarchyResolver,
    pub linker: HierarchyLinker,
    /// Issues shown on the dashboard
    pub dashboard_issue_limit: u32,
}

impl ServerState {
    pub fn new(app: &AppState) -> Self {
        Self {
            tracker: app.tracker.clone(),
            aggregator: app.aggregator(),
            resolver: app.resolver(),
            linker: app.linker(),
            dashboard_issue_limit: app.config.dashboard_issue_limit,
        }
    }
}

pub type ApiState = Arc<ServerState>;

// ============================================================================
// Health check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Liveness only. The tracker is not contacted.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    /// The tracker failed or answered with something unusable.
    BadGateway(String),
    /// The tracker understood the request and refused it.
    Unprocessable(String),
}

impl AppError {
    fn from_tracker(err: &TrackerError, message: String) -> Self {
        match err {
            TrackerError::NotFound(_) => AppError::NotFound(message),
            TrackerError::MutationRejected(_) => AppError::Unprocessable(message),
            TrackerError::Transport { .. } | TrackerError::GraphQuery(_) | TrackerError::Parse(_) => {
                AppError::BadGateway(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        let message = err.to_string();
        AppError::from_tracker(&err, message)
    }
}

impl From<LinkError> for AppError {
    fn from(err: LinkError) -> Self {
        let message = err.to_string();
        AppError::from_tracker(&err.source, message)
    }
}

impl From<ChildIssueError> for AppError {
    fn from(err: ChildIssueError) -> Self {
        let message = err.to_string();
        match &err {
            ChildIssueError::Create(source) => AppError::from_tracker(source, message),
            ChildIssueError::Link(link) => AppError::from_tracker(&link.source, message),
        }
    }
}
