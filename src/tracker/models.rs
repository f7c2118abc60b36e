//! Wire types exchanged with the tracker's REST and graph endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::error::{TrackerError, TrackerResult};

// ============================================================================
// REST resources
// ============================================================================

/// An issue as returned by the tracker.
///
/// Only the fields the enrichment core reads are typed; everything else the
/// tracker sends is kept in `extra` and serialized back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub iid: i64,
    pub project_id: i64,
    pub title: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A label on an issue: a bare name, or the full label object when the
/// listing asked for label details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IssueLabel {
    Detailed {
        name: String,
        #[serde(flatten)]
        details: Map<String, Value>,
    },
    Name(String),
}

impl IssueLabel {
    pub fn name(&self) -> &str {
        match self {
            Self::Detailed { name, .. } | Self::Name(name) => name,
        }
    }
}

impl From<&str> for IssueLabel {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Author or actor attached to notes and resource events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub avatar_url: String,
}

/// A comment or system note on an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: UserRef,
    #[serde(default)]
    pub system: bool,
    pub created_at: DateTime<Utc>,
}

/// Direction of a label change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelAction {
    Add,
    Remove,
}

/// The label referenced by a label event. Absent when the label was deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRef {
    #[serde(default)]
    pub id: i64,
    pub name: String,
}

/// A resource label event on an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEvent {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user: UserRef,
    #[serde(default)]
    pub label: Option<LabelRef>,
    pub action: LabelAction,
    pub created_at: DateTime<Utc>,
}

/// The subset of a project the core needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_with_namespace: String,
}

impl Project {
    /// Human-facing display name, falling back to the short name.
    pub fn display_name(&self) -> &str {
        if self.name_with_namespace.is_empty() {
            &self.name
        } else {
            &self.name_with_namespace
        }
    }
}

/// Payload for creating an issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewIssue {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "labels_as_csv",
        deserialize_with = "labels_from_csv_or_list"
    )]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignee_ids: Vec<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewIssue {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Filters for listing issues. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueListOptions {
    pub scope: Option<String>,
    pub state: Option<String>,
    pub labels: Vec<String>,
    pub search: Option<String>,
    pub iids: Vec<i64>,
    pub author_id: Option<i64>,
    pub assignee_id: Option<i64>,
    pub order_by: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Ask for label objects (color, description) instead of names.
    pub with_label_details: bool,
}

impl IssueListOptions {
    /// The caller's most recently updated assigned issues.
    pub fn assigned_to_me(limit: u32) -> Self {
        Self {
            scope: Some("assigned_to_me".into()),
            order_by: Some("updated_at".into()),
            sort: Some("desc".into()),
            page: Some(1),
            per_page: Some(limit),
            ..Default::default()
        }
    }

    /// Flatten into query pairs in a stable order.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |key: &str, value: String| query.push((key.to_string(), value));

        if let Some(scope) = &self.scope {
            push("scope", scope.clone());
        }
        if let Some(state) = &self.state {
            push("state", state.clone());
        }
        if !self.labels.is_empty() {
            push("labels", self.labels.join(","));
        }
        if let Some(search) = &self.search {
            push("search", search.clone());
        }
        for iid in &self.iids {
            push("iids[]", iid.to_string());
        }
        if let Some(author_id) = self.author_id {
            push("author_id", author_id.to_string());
        }
        if let Some(assignee_id) = self.assignee_id {
            push("assignee_id", assignee_id.to_string());
        }
        if let Some(order_by) = &self.order_by {
            push("order_by", order_by.clone());
        }
        if let Some(sort) = &self.sort {
            push("sort", sort.clone());
        }
        if let Some(page) = self.page {
            push("page", page.to_string());
        }
        if let Some(per_page) = self.per_page {
            push("per_page", per_page.to_string());
        }
        if self.with_label_details {
            push("with_label_details", "true".to_string());
        }
        query
    }
}

/// Paging for note listing. Notes are always requested newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteListOptions {
    pub page: u32,
    pub per_page: u32,
}

impl NoteListOptions {
    pub fn first_page(per_page: u32) -> Self {
        Self { page: 1, per_page }
    }
}

// ============================================================================
// Graph endpoint
// ============================================================================

/// Body posted to the graph endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: Value,
}

impl GraphQlRequest {
    /// A request without variables. The tracker rejects `null` variables, so
    /// an empty object is sent.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Value::Object(Map::new()),
        }
    }

    pub fn with_variables(query: impl Into<String>, variables: Value) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// One entry of a graph response's `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlErrorEntry {
    #[serde(default)]
    pub message: String,
}

/// Raw graph response: `{data, errors}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<GraphQlErrorEntry>,
}

impl GraphQlResponse {
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn from_errors<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: None,
            errors: messages
                .into_iter()
                .map(|m| GraphQlErrorEntry { message: m.into() })
                .collect(),
        }
    }

    /// Unwrap `data`, turning a non-empty `errors` array into
    /// [`TrackerError::GraphQuery`] and a missing `data` into
    /// [`TrackerError::Parse`].
    pub fn into_data(self) -> TrackerResult<Value> {
        if !self.errors.is_empty() {
            return Err(TrackerError::GraphQuery(
                self.errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        match self.data {
            Some(Value::Null) | None => Err(TrackerError::Parse(
                "graph response carried neither data nor errors".into(),
            )),
            Some(data) => Ok(data),
        }
    }
}

/// Global identifier of a work item for a numeric issue id.
pub fn work_item_gid(issue_id: i64) -> String {
    format!("gid://gitlab/WorkItem/{issue_id}")
}

/// Global identifier of a project for a numeric project id.
pub fn project_gid(project_id: i64) -> String {
    format!("gid://gitlab/Project/{project_id}")
}

// ============================================================================
// Serde helpers
// ============================================================================

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn labels_as_csv<S>(labels: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&labels.join(","))
}

fn labels_from_csv_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::List(labels)) => labels,
        Some(Raw::Csv(csv)) => csv
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        None => Vec::new(),
    })
}

/// Accept an iid sent either as a JSON string (graph endpoint) or a number.
pub(crate) fn iid_from_string_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
