//! Issue handlers: dashboard feed, enriched listings and hierarchy changes

use super::handlers::{ApiState, AppError};
use crate::enrichment::models::{
    ActivityFeedItem, ChildLinkStatus, CreateChildOutcome, CreateChildRequest,
    CreateIssueWithChildrenRequest, EnrichedIssue, IssueWithChildren,
};
use crate::tracker::models::{Issue, IssueListOptions};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub recent_issues: Vec<Issue>,
    pub recent_activities: Vec<ActivityFeedItem>,
}

/// Most recently updated issues assigned to the caller, with their activity.
///
/// A failed listing yields empty lists rather than an error.
pub async fn dashboard(State(state): State<ApiState>) -> Json<DashboardResponse> {
    let opts = IssueListOptions::assigned_to_me(state.dashboard_issue_limit);
    let recent_issues = match state.tracker.list_issues(&opts).await {
        Ok(issues) => issues,
        Err(e) => {
            warn!(error = %e, "Dashboard issue listing failed");
            Vec::new()
        }
    };
    let recent_activities = state.aggregator.aggregate(&recent_issues).await;

    Json(DashboardResponse {
        recent_issues,
        recent_activities,
    })
}

// ============================================================================
// Enriched issues
// ============================================================================

/// Query parameters for issue listing. Numeric filters arrive as text so a
/// malformed value gets a specific error.
#[derive(Debug, Default, Deserialize)]
pub struct IssueListQuery {
    pub labels: Option<String>,
    pub search: Option<String>,
    /// Comma-separated issue numbers
    pub issue_ids: Option<String>,
    pub author_id: Option<String>,
    pub assignee_id: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_id(value: Option<String>, what: &str) -> Result<Option<i64>, AppError> {
    non_empty(value)
        .map(|v| {
            v.parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid {what}")))
        })
        .transpose()
}

impl IssueListQuery {
    pub fn into_options(self) -> Result<IssueListOptions, AppError> {
        let iids = match non_empty(self.issue_ids) {
            Some(raw) => raw
                .split(',')
                .map(|id| id.trim().parse::<i64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| AppError::BadRequest("Invalid issue IDs".into()))?,
            None => Vec::new(),
        };
        let labels = non_empty(self.labels)
            .map(|l| {
                l.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(IssueListOptions {
            scope: non_empty(self.scope),
            state: non_empty(self.state),
            labels,
            search: non_empty(self.search),
            iids,
            author_id: parse_id(self.author_id, "author ID")?,
            assignee_id: parse_id(self.assignee_id, "assignee ID")?,
            order_by: None,
            sort: None,
            page: self.page,
            per_page: self.per_page,
            with_label_details: true,
        })
    }
}

/// List issues with their project names and children.
pub async fn list_issues(
    State(state): State<ApiState>,
    Query(query): Query<IssueListQuery>,
) -> Result<Json<Vec<EnrichedIssue>>, AppError> {
    let opts = query.into_options()?;
    let issues = state.tracker.list_issues(&opts).await?;
    if issues.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(state.resolver.resolve_hierarchy(issues).await))
}

pub async fn get_issue(
    State(state): State<ApiState>,
    Path((project_id, issue_iid)): Path<(i64, i64)>,
) -> Result<Json<EnrichedIssue>, AppError> {
    let issue = state.tracker.get_issue(project_id, issue_iid).await?;
    let enriched = state.resolver.resolve_hierarchy(vec![issue]).await;
    enriched
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("enrichment dropped the issue")))
}

// ============================================================================
// Hierarchy changes
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreateChildResponse {
    pub message: String,
    pub status: ChildLinkStatus,
    #[serde(flatten)]
    pub outcome: CreateChildOutcome,
}

/// Attach a child to an issue, creating the child unless `existing_child_iid`
/// is given. A created child that could not be linked is still a 201.
pub async fn create_child_issue(
    State(state): State<ApiState>,
    Path((project_id, parent_iid)): Path<(i64, i64)>,
    Json(request): Json<CreateChildRequest>,
) -> Result<(StatusCode, Json<CreateChildResponse>), AppError> {
    if request.existing_child_iid.is_none() && request.issue.title.trim().is_empty() {
        return Err(AppError::BadRequest("title is required".into()));
    }

    let outcome = state
        .linker
        .create_child_issue(project_id, parent_iid, request)
        .await?;

    let (status, message) = match &outcome {
        CreateChildOutcome::LinkedExisting { .. } => {
            (StatusCode::OK, "Child issue linked successfully")
        }
        CreateChildOutcome::Created { .. } => {
            (StatusCode::CREATED, "Child issue created and linked successfully")
        }
        CreateChildOutcome::CreatedUnlinked { .. } => {
            (StatusCode::CREATED, "Child issue created but failed to link")
        }
    };

    Ok((
        status,
        Json(CreateChildResponse {
            message: message.to_string(),
            status: outcome.link_status(),
            outcome,
        }),
    ))
}

pub async fn unlink_child(
    State(state): State<ApiState>,
    Path((project_id, _parent_iid, child_iid)): Path<(i64, i64, i64)>,
) -> Result<StatusCode, AppError> {
    state.linker.unlink_child(child_iid, project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_issue_with_children(
    State(state): State<ApiState>,
    Path(project_id): Path<i64>,
    Json(request): Json<CreateIssueWithChildrenRequest>,
) -> Result<(StatusCode, Json<IssueWithChildren>), AppError> {
    if request.parent.title.trim().is_empty() {
        return Err(AppError::BadRequest("title is required".into()));
    }
    let result = state
        .linker
        .create_issue_with_children(project_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}
