//! Trait abstraction for the remote issue tracker

use super::error::TrackerResult;
use super::models::*;
use async_trait::async_trait;

/// Everything the enrichment core needs from the tracker.
///
/// The core only ever holds an `Arc<dyn TrackerClient>`; the HTTP client and
/// the in-memory test mock both implement it.
#[async_trait]
pub trait TrackerClient: Send + Sync {
    // ========================================================================
    // Activity sources
    // ========================================================================

    /// Notes on an issue, newest first.
    async fn list_issue_notes(
        &self,
        project_id: i64,
        issue_iid: i64,
        opts: NoteListOptions,
    ) -> TrackerResult<Vec<Note>>;

    /// Resource label events on an issue.
    async fn list_label_events(
        &self,
        project_id: i64,
        issue_iid: i64,
        page: u32,
        per_page: u32,
    ) -> TrackerResult<Vec<LabelEvent>>;

    // ========================================================================
    // Projects and issues
    // ========================================================================

    async fn get_project(&self, project_id: i64) -> TrackerResult<Project>;

    async fn list_issues(&self, opts: &IssueListOptions) -> TrackerResult<Vec<Issue>>;

    async fn get_issue(&self, project_id: i64, issue_iid: i64) -> TrackerResult<Issue>;

    async fn create_issue(&self, project_id: i64, issue: &NewIssue) -> TrackerResult<Issue>;

    // ========================================================================
    // Graph endpoint
    // ========================================================================

    /// Execute a graph query or mutation. Transport failures are errors; an
    /// `errors` array in the body is returned as-is for the caller to judge.
    async fn graphql(&self, request: &GraphQlRequest) -> TrackerResult<GraphQlResponse>;
}
