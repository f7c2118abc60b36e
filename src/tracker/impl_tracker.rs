//! TrackerClient trait implementation for GitLabClient
//!
//! Each trait method delegates to the inherent method of the same name.

use async_trait::async_trait;

use super::client::GitLabClient;
use super::error::TrackerResult;
use super::models::{
    GraphQlRequest, GraphQlResponse, Issue, IssueListOptions, LabelEvent, NewIssue, Note,
    NoteListOptions, Project,
};
use super::traits::TrackerClient;

#[async_trait]
impl TrackerClient for GitLabClient {
    async fn list_issue_notes(
        &self,
        project_id: i64,
        issue_iid: i64,
        opts: NoteListOptions,
    ) -> TrackerResult<Vec<Note>> {
        self.list_issue_notes(project_id, issue_iid, opts).await
    }

    async fn list_label_events(
        &self,
        project_id: i64,
        issue_iid: i64,
        page: u32,
        per_page: u32,
    ) -> TrackerResult<Vec<LabelEvent>> {
        self.list_label_events(project_id, issue_iid, page, per_page)
            .await
    }

    async fn get_project(&self, project_id: i64) -> TrackerResult<Project> {
        self.get_project(project_id).await
    }

    async fn list_issues(&self, opts: &IssueListOptions) -> TrackerResult<Vec<Issue>> {
        self.list_issues(opts).await
    }

    async fn get_issue(&self, project_id: i64, issue_iid: i64) -> TrackerResult<Issue> {
        self.get_issue(project_id, issue_iid).await
    }

    async fn create_issue(&self, project_id: i64, issue: &NewIssue) -> TrackerResult<Issue> {
        self.create_issue(project_id, issue).await
    }

    async fn graphql(&self, request: &GraphQlRequest) -> TrackerResult<GraphQlResponse> {
        self.graphql(request).await
    }
}
