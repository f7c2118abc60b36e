//! Parent/child linking between work items
//!
//! Issue numbers are not valid mutation targets, so every link or unlink
//! first resolves opaque work item ids and only then mutates. The two steps
//! fail with distinct [`LinkStep`]s. Nothing is retried.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{
    ChildIssueResult, ChildLinkStatus, CreateChildOutcome, CreateChildRequest,
    CreateIssueWithChildrenRequest, IssueWithChildren,
};
use crate::tracker::models::{project_gid, GraphQlRequest, NewIssue};
use crate::tracker::{TrackerClient, TrackerError, TrackerResult};

const LINK_LOOKUP_QUERY: &str = r#"query($projectIds: [ID!]!, $childIID: String!, $parentIID: String!) {
  projects(ids: $projectIds) {
    nodes {
      parent: workItems(iids: [$parentIID]) { nodes { id } }
      child: workItems(iids: [$childIID]) { nodes { id } }
    }
  }
}"#;

const UNLINK_LOOKUP_QUERY: &str = r#"query($projectIds: [ID!]!, $childIID: String!) {
  projects(ids: $projectIds) {
    nodes {
      child: workItems(iids: [$childIID]) { nodes { id } }
    }
  }
}"#;

const SET_PARENT_MUTATION: &str = r#"mutation($id: WorkItemID!, $parentId: WorkItemID) {
  workItemUpdate(input: {id: $id, hierarchyWidget: {parentId: $parentId}}) {
    errors
  }
}"#;

/// Issue type given to children created without one.
pub const DEFAULT_CHILD_ISSUE_TYPE: &str = "task";

// ============================================================================
// Errors
// ============================================================================

/// Step of a link or unlink call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStep {
    ResolveIds,
    Mutate,
}

impl fmt::Display for LinkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolveIds => write!(f, "work item id resolution"),
            Self::Mutate => write!(f, "hierarchy update"),
        }
    }
}

#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct LinkError {
    pub step: LinkStep,
    pub source: TrackerError,
}

impl LinkError {
    fn resolve(source: TrackerError) -> Self {
        Self {
            step: LinkStep::ResolveIds,
            source,
        }
    }

    fn mutate(source: TrackerError) -> Self {
        Self {
            step: LinkStep::Mutate,
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChildIssueError {
    #[error("failed to create issue: {0}")]
    Create(#[source] TrackerError),
    #[error("failed to link existing issue: {0}")]
    Link(#[source] LinkError),
}

// ============================================================================
// Lookup response shapes
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Connection<T> {
    #[serde(default)]
    nodes: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct IdNode {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectWorkItems {
    #[serde(default)]
    parent: Option<Connection<IdNode>>,
    #[serde(default)]
    child: Option<Connection<IdNode>>,
}

#[derive(Debug, Deserialize)]
struct LookupData {
    #[serde(default)]
    projects: Option<Connection<ProjectWorkItems>>,
}

fn first_id(conn: Option<Connection<IdNode>>) -> Option<String> {
    conn?
        .nodes?
        .into_iter()
        .find_map(|n| n.id.filter(|id| !id.is_empty()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutationData {
    #[serde(default)]
    work_item_update: Option<MutationPayload>,
}

#[derive(Debug, Deserialize)]
struct MutationPayload {
    #[serde(default)]
    errors: Option<Vec<String>>,
}

/// Opaque ids for one link call.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedIds {
    child: String,
    parent: Option<String>,
}

// ============================================================================
// Linker
// ============================================================================

pub struct HierarchyLinker {
    tracker: Arc<dyn TrackerClient>,
}

impl HierarchyLinker {
    pub fn new(tracker: Arc<dyn TrackerClient>) -> Self {
        Self { tracker }
    }

    /// Make `child_iid` a child of `parent_iid`, both in `project_id`.
    pub async fn link_child(
        &self,
        parent_iid: i64,
        child_iid: i64,
        project_id: i64,
    ) -> Result<(), LinkError> {
        let ids = self
            .resolve_ids(project_id, child_iid, Some(parent_iid))
            .await
            .map_err(LinkError::resolve)?;
        self.set_parent(&ids.child, ids.parent.as_deref())
            .await
            .map_err(LinkError::mutate)?;

        info!(project_id, parent_iid, child_iid, "Linked child work item");
        Ok(())
    }

    /// Detach `child_iid` from whatever parent it has.
    pub async fn unlink_child(&self, child_iid: i64, project_id: i64) -> Result<(), LinkError> {
        let ids = self
            .resolve_ids(project_id, child_iid, None)
            .await
            .map_err(LinkError::resolve)?;
        self.set_parent(&ids.child, None)
            .await
            .map_err(LinkError::mutate)?;

        info!(project_id, child_iid, "Unlinked child work item");
        Ok(())
    }

    async fn resolve_ids(
        &self,
        project_id: i64,
        child_iid: i64,
        parent_iid: Option<i64>,
    ) -> TrackerResult<ResolvedIds> {
        let mut variables = json!({
            "projectIds": [project_gid(project_id)],
            "childIID": child_iid.to_string(),
        });
        let query = match parent_iid {
            Some(parent_iid) => {
                variables["parentIID"] = Value::String(parent_iid.to_string());
                LINK_LOOKUP_QUERY
            }
            None => UNLINK_LOOKUP_QUERY,
        };

        let data = self
            .tracker
            .graphql(&GraphQlRequest::with_variables(query, variables))
            .await?
            .into_data()?;
        let lookup: LookupData = serde_json::from_value(data)?;

        let project = lookup
            .projects
            .and_then(|p| p.nodes)
            .and_then(|nodes| nodes.into_iter().next())
            .ok_or_else(|| TrackerError::NotFound(format!("project {project_id}")))?;

        let child = first_id(project.child).ok_or_else(|| {
            TrackerError::NotFound(format!(
                "child work item #{child_iid} in project {project_id}"
            ))
        })?;

        let parent = match parent_iid {
            Some(parent_iid) => Some(first_id(project.parent).ok_or_else(|| {
                TrackerError::NotFound(format!(
                    "parent work item #{parent_iid} in project {project_id}"
                ))
            })?),
            None => None,
        };

        debug!(project_id, child = %child, parent = ?parent, "Resolved work item ids");
        Ok(ResolvedIds { child, parent })
    }

    async fn set_parent(&self, child_gid: &str, parent_gid: Option<&str>) -> TrackerResult<()> {
        let variables = json!({ "id": child_gid, "parentId": parent_gid });
        let data = self
            .tracker
            .graphql(&GraphQlRequest::with_variables(
                SET_PARENT_MUTATION,
                variables,
            ))
            .await?
            .into_data()?;

        let payload: MutationData = serde_json::from_value(data)?;
        let errors = payload
            .work_item_update
            .ok_or_else(|| TrackerError::Parse("response lacks workItemUpdate".into()))?
            .errors
            .unwrap_or_default();
        if !errors.is_empty() {
            return Err(TrackerError::MutationRejected(errors));
        }
        Ok(())
    }

    // ========================================================================
    // Composite flows
    // ========================================================================

    /// Attach a child to `parent_iid`, creating it first unless
    /// `existing_child_iid` is given.
    ///
    /// Linking an existing issue fails as a whole. A freshly created child
    /// whose link fails is kept and reported as unlinked.
    pub async fn create_child_issue(
        &self,
        project_id: i64,
        parent_iid: i64,
        request: CreateChildRequest,
    ) -> Result<CreateChildOutcome, ChildIssueError> {
        if let Some(child_iid) = request.existing_child_iid {
            self.link_child(parent_iid, child_iid, project_id)
                .await
                .map_err(ChildIssueError::Link)?;
            return Ok(CreateChildOutcome::LinkedExisting { child_iid });
        }

        let child = self
            .tracker
            .create_issue(project_id, &with_default_type(request.issue))
            .await
            .map_err(ChildIssueError::Create)?;

        match self.link_child(parent_iid, child.iid, project_id).await {
            Ok(()) => Ok(CreateChildOutcome::Created { issue: child }),
            Err(e) => {
                warn!(
                    project_id,
                    parent_iid,
                    child_iid = child.iid,
                    error = %e,
                    "Child created but not linked"
                );
                Ok(CreateChildOutcome::CreatedUnlinked {
                    issue: child,
                    error: e.to_string(),
                })
            }
        }
    }

    /// Create a parent issue, then each child in turn, linking every child
    /// to the parent. Only a failed parent creation fails the call.
    pub async fn create_issue_with_children(
        &self,
        project_id: i64,
        request: CreateIssueWithChildrenRequest,
    ) -> TrackerResult<IssueWithChildren> {
        let parent = self
            .tracker
            .create_issue(project_id, &request.parent)
            .await?;

        let mut child_results = Vec::with_capacity(request.child_issues.len());
        for child in request.child_issues {
            let title = child.title.clone();
            let created = match self
                .tracker
                .create_issue(project_id, &with_default_type(child))
                .await
            {
                Ok(created) => created,
                Err(e) => {
                    warn!(project_id, title = %title, error = %e, "Child issue creation failed");
                    child_results.push(ChildIssueResult {
                        title,
                        status: ChildLinkStatus::Failed,
                        issue: None,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };

            let result = match self
                .link_child(parent.iid, created.iid, parent.project_id)
                .await
            {
                Ok(()) => ChildIssueResult {
                    title,
                    status: ChildLinkStatus::Success,
                    issue: Some(created),
                    error: None,
                },
                Err(e) => ChildIssueResult {
                    title,
                    status: ChildLinkStatus::SuccessUnlinked,
                    issue: Some(created),
                    error: Some(format!("Failed to link to parent: {e}")),
                },
            };
            child_results.push(result);
        }

        Ok(IssueWithChildren {
            parent_issue: parent,
            child_results,
        })
    }
}

fn with_default_type(mut issue: NewIssue) -> NewIssue {
    if issue.issue_type.is_none() {
        issue.issue_type = Some(DEFAULT_CHILD_ISSUE_TYPE.to_string());
    }
    issue
}
