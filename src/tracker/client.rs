//! HTTP client for a GitLab-compatible tracker

use super::error::{TrackerError, TrackerResult};
use super::models::*;
use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Client for the tracker's REST (`/api/v4`) and graph (`/api/graphql`) endpoints
pub struct GitLabClient {
    http: reqwest::Client,
    rest_root: String,
    graphql_url: String,
    token: String,
}

impl GitLabClient {
    /// Create a new client against `base_url` (e.g. `https://gitlab.com`).
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build tracker HTTP client")?;

        let base = base_url.trim_end_matches('/');
        Ok(Self {
            http,
            rest_root: format!("{base}/api/v4"),
            graphql_url: format!("{base}/api/graphql"),
            token: token.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}{}", self.rest_root, path));
        self.authorize(req)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            req
        } else {
            req.bearer_auth(&self.token)
        }
    }

    /// Send, reject non-2xx with the body attached, and decode JSON.
    async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> TrackerResult<T> {
        let response = req.send().await?;
        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn check_status(response: Response) -> TrackerResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TrackerError::status(status.as_u16(), body))
    }

    // ========================================================================
    // Activity sources
    // ========================================================================

    pub async fn list_issue_notes(
        &self,
        project_id: i64,
        issue_iid: i64,
        opts: NoteListOptions,
    ) -> TrackerResult<Vec<Note>> {
        debug!(project_id, issue_iid, per_page = opts.per_page, "Listing issue notes");
        let req = self
            .request(
                Method::GET,
                &format!("/projects/{project_id}/issues/{issue_iid}/notes"),
            )
            .query(&[
                ("order_by", "created_at".to_string()),
                ("sort", "desc".to_string()),
                ("page", opts.page.to_string()),
                ("per_page", opts.per_page.to_string()),
            ]);
        Self::send_json(req).await
    }

    pub async fn list_label_events(
        &self,
        project_id: i64,
        issue_iid: i64,
        page: u32,
        per_page: u32,
    ) -> TrackerResult<Vec<LabelEvent>> {
        debug!(project_id, issue_iid, per_page, "Listing label events");
        let req = self
            .request(
                Method::GET,
                &format!("/projects/{project_id}/issues/{issue_iid}/resource_label_events"),
            )
            .query(&[("page", page), ("per_page", per_page)]);
        Self::send_json(req).await
    }

    // ========================================================================
    // Projects and issues
    // ========================================================================

    pub async fn get_project(&self, project_id: i64) -> TrackerResult<Project> {
        let req = self.request(Method::GET, &format!("/projects/{project_id}"));
        Self::send_json(req).await
    }

    pub async fn list_issues(&self, opts: &IssueListOptions) -> TrackerResult<Vec<Issue>> {
        let req = self.request(Method::GET, "/issues").query(&opts.to_query());
        Self::send_json(req).await
    }

    pub async fn get_issue(&self, project_id: i64, issue_iid: i64) -> TrackerResult<Issue> {
        let req = self.request(
            Method::GET,
            &format!("/projects/{project_id}/issues/{issue_iid}"),
        );
        match Self::send_json(req).await {
            Err(TrackerError::Transport {
                status: Some(404), ..
            }) => Err(TrackerError::NotFound(format!(
                "issue #{issue_iid} in project {project_id}"
            ))),
            other => other,
        }
    }

    pub async fn create_issue(&self, project_id: i64, issue: &NewIssue) -> TrackerResult<Issue> {
        debug!(project_id, title = %issue.title, "Creating issue");
        let req = self
            .request(Method::POST, &format!("/projects/{project_id}/issues"))
            .json(issue);
        Self::send_json(req).await
    }

    // ========================================================================
    // Graph endpoint
    // ========================================================================

    pub async fn graphql(&self, request: &GraphQlRequest) -> TrackerResult<GraphQlResponse> {
        let req = self
            .authorize(self.http.post(&self.graphql_url))
            .json(request);
        Self::send_json(req).await
    }
}
