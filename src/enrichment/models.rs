//! Records produced by the enrichment engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracker::models::{iid_from_string_or_number, Issue, NewIssue};

// ============================================================================
// Activity
// ============================================================================

/// Source of a normalized activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Comment,
    SystemNote,
    LabelEvent,
}

/// One normalized unit of issue activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    pub actor_name: String,
    pub actor_avatar: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub is_system: bool,
    pub priority: u8,
}

/// What the feed entry reports for an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Comment,
    SystemNote,
    LabelEvent,
    /// No usable activity; the entry falls back to the issue's own fields.
    IssueUpdate,
}

impl From<ActivityKind> for ActionType {
    fn from(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Comment => Self::Comment,
            ActivityKind::SystemNote => Self::SystemNote,
            ActivityKind::LabelEvent => Self::LabelEvent,
        }
    }
}

pub const NO_RECENT_ACTIVITY: &str = "No recent activity";
pub const ACTIVITY_FETCH_FAILED: &str = "Activity fetch partially failed";

/// Feed entry for one issue. Always produced, even when its fetches failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFeedItem {
    pub issue_id: i64,
    pub issue_iid: i64,
    pub project_id: i64,
    pub title: String,
    pub web_url: String,
    pub action_type: ActionType,
    pub actor_name: String,
    pub actor_avatar: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl ActivityFeedItem {
    /// Entry carrying only the issue's own fields, stamped with its last update.
    pub fn base(issue: &Issue, description: &str) -> Self {
        Self {
            issue_id: issue.id,
            issue_iid: issue.iid,
            project_id: issue.project_id,
            title: issue.title.clone(),
            web_url: issue.web_url.clone(),
            action_type: ActionType::IssueUpdate,
            actor_name: String::new(),
            actor_avatar: String::new(),
            description: description.to_string(),
            created_at: issue.updated_at.unwrap_or_default(),
        }
    }

    pub fn from_record(issue: &Issue, record: ActivityRecord) -> Self {
        Self {
            action_type: record.kind.into(),
            actor_name: record.actor_name,
            actor_avatar: record.actor_avatar,
            description: record.description,
            created_at: record.created_at,
            ..Self::base(issue, "")
        }
    }
}

// ============================================================================
// Hierarchy
// ============================================================================

/// A child work item reference: opaque global id plus project-scoped number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    pub id: String,
    #[serde(deserialize_with = "iid_from_string_or_number")]
    pub iid: i64,
}

/// Children of one issue. `items` is never null on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyInfo {
    pub amount: usize,
    #[serde(default)]
    pub items: Vec<ChildRef>,
}

impl HierarchyInfo {
    pub fn contains_iid(&self, iid: i64) -> bool {
        self.items.iter().any(|c| c.iid == iid)
    }
}

/// An issue with its resolved project name and children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedIssue {
    #[serde(flatten)]
    pub issue: Issue,
    pub project_name: String,
    pub child: HierarchyInfo,
}

// ============================================================================
// Child creation flows
// ============================================================================

/// Body of a "create child issue" call.
///
/// With `existing_child_iid` set, the issue fields are ignored and only the
/// link is made.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateChildRequest {
    #[serde(flatten)]
    pub issue: NewIssue,
    #[serde(default)]
    pub existing_child_iid: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreateChildOutcome {
    /// An existing issue was attached to the parent.
    LinkedExisting { child_iid: i64 },
    /// A new child was created and attached.
    Created { issue: Issue },
    /// A new child was created but attaching it failed. Nothing is rolled back.
    CreatedUnlinked { issue: Issue, error: String },
}

impl CreateChildOutcome {
    pub fn link_status(&self) -> ChildLinkStatus {
        match self {
            Self::CreatedUnlinked { .. } => ChildLinkStatus::SuccessUnlinked,
            Self::LinkedExisting { .. } | Self::Created { .. } => ChildLinkStatus::Success,
        }
    }
}

/// Body of a "create issue with children" call: the parent's fields plus
/// the children to create under it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateIssueWithChildrenRequest {
    #[serde(flatten)]
    pub parent: NewIssue,
    #[serde(default)]
    pub child_issues: Vec<NewIssue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildLinkStatus {
    Success,
    SuccessUnlinked,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildIssueResult {
    pub title: String,
    pub status: ChildLinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueWithChildren {
    pub parent_issue: Issue,
    pub child_results: Vec<ChildIssueResult>,
}
