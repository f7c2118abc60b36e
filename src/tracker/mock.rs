//! In-memory mock implementation of TrackerClient for testing without a live tracker.

use super::error::{TrackerError, TrackerResult};
use super::models::*;
use super::traits::TrackerClient;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory tracker.
///
/// Issues, notes and label events live behind async `RwLock`s. The graph
/// endpoint is emulated by recognizing the three query shapes the core sends:
/// aliased hierarchy batches, work item id lookups and `workItemUpdate`
/// mutations. Parent links set by mutations show up in later batches.
pub struct MockTracker {
    issues: RwLock<Vec<Issue>>,
    notes: RwLock<HashMap<(i64, i64), Vec<Note>>>,
    label_events: RwLock<HashMap<(i64, i64), Vec<LabelEvent>>>,
    projects: RwLock<HashMap<i64, Project>>,
    /// child issue id -> parent issue id
    parents: RwLock<HashMap<i64, i64>>,

    failing_notes: RwLock<HashSet<(i64, i64)>>,
    failing_label_events: RwLock<HashSet<(i64, i64)>>,
    failing_projects: RwLock<HashSet<i64>>,
    /// Any batch mentioning one of these issue ids fails as a whole.
    failing_work_items: RwLock<HashSet<i64>>,
    /// Projects whose graph data carries no `project` object.
    graph_hidden_projects: RwLock<HashSet<i64>>,
    rejected_mutation: RwLock<Option<Vec<String>>>,
    failing_create: RwLock<HashSet<String>>,
    list_fails: RwLock<bool>,
    note_delays: RwLock<HashMap<(i64, i64), Duration>>,
    graph_delay: RwLock<Option<Duration>>,

    notes_served: AtomicUsize,
    graphql_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
    project_calls: AtomicUsize,
}

impl MockTracker {
    pub fn new() -> Self {
        Self {
            issues: RwLock::new(Vec::new()),
            notes: RwLock::new(HashMap::new()),
            label_events: RwLock::new(HashMap::new()),
            projects: RwLock::new(HashMap::new()),
            parents: RwLock::new(HashMap::new()),
            failing_notes: RwLock::new(HashSet::new()),
            failing_label_events: RwLock::new(HashSet::new()),
            failing_projects: RwLock::new(HashSet::new()),
            failing_work_items: RwLock::new(HashSet::new()),
            graph_hidden_projects: RwLock::new(HashSet::new()),
            rejected_mutation: RwLock::new(None),
            failing_create: RwLock::new(HashSet::new()),
            list_fails: RwLock::new(false),
            note_delays: RwLock::new(HashMap::new()),
            graph_delay: RwLock::new(None),
            notes_served: AtomicUsize::new(0),
            graphql_calls: AtomicUsize::new(0),
            mutation_calls: AtomicUsize::new(0),
            project_calls: AtomicUsize::new(0),
        }
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    pub async fn add_issue(&self, issue: Issue) {
        self.issues.write().await.push(issue);
    }

    pub async fn add_project(&self, id: i64, name_with_namespace: &str) {
        self.projects.write().await.insert(
            id,
            Project {
                id,
                name: name_with_namespace
                    .rsplit(" / ")
                    .next()
                    .unwrap_or_default()
                    .to_string(),
                name_with_namespace: name_with_namespace.to_string(),
            },
        );
    }

    pub async fn set_notes(&self, project_id: i64, iid: i64, notes: Vec<Note>) {
        self.notes.write().await.insert((project_id, iid), notes);
    }

    pub async fn set_label_events(&self, project_id: i64, iid: i64, events: Vec<LabelEvent>) {
        self.label_events
            .write()
            .await
            .insert((project_id, iid), events);
    }

    pub async fn set_parent(&self, child_id: i64, parent_id: i64) {
        self.parents.write().await.insert(child_id, parent_id);
    }

    pub async fn parent_of(&self, child_id: i64) -> Option<i64> {
        self.parents.read().await.get(&child_id).copied()
    }

    pub async fn issue_count(&self) -> usize {
        self.issues.read().await.len()
    }

    // ------------------------------------------------------------------------
    // Failure injection
    // ------------------------------------------------------------------------

    pub async fn fail_notes_for(&self, project_id: i64, iid: i64) {
        self.failing_notes.write().await.insert((project_id, iid));
    }

    pub async fn fail_label_events_for(&self, project_id: i64, iid: i64) {
        self.failing_label_events
            .write()
            .await
            .insert((project_id, iid));
    }

    pub async fn fail_project(&self, project_id: i64) {
        self.failing_projects.write().await.insert(project_id);
    }

    pub async fn fail_work_item(&self, issue_id: i64) {
        self.failing_work_items.write().await.insert(issue_id);
    }

    pub async fn hide_project_in_graph(&self, project_id: i64) {
        self.graph_hidden_projects.write().await.insert(project_id);
    }

    pub async fn reject_mutations_with(&self, errors: Vec<String>) {
        *self.rejected_mutation.write().await = Some(errors);
    }

    pub async fn fail_create_titled(&self, title: &str) {
        self.failing_create.write().await.insert(title.to_string());
    }

    pub async fn fail_listing(&self) {
        *self.list_fails.write().await = true;
    }

    pub async fn delay_notes_for(&self, project_id: i64, iid: i64, delay: Duration) {
        self.note_delays
            .write()
            .await
            .insert((project_id, iid), delay);
    }

    /// Every graph call sleeps this long before answering.
    pub async fn delay_graph(&self, delay: Duration) {
        *self.graph_delay.write().await = Some(delay);
    }

    // ------------------------------------------------------------------------
    // Call counters
    // ------------------------------------------------------------------------

    /// Note listings that got past their delay and answered.
    pub fn notes_served(&self) -> usize {
        self.notes_served.load(Ordering::SeqCst)
    }

    pub fn graphql_calls(&self) -> usize {
        self.graphql_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    pub fn project_calls(&self) -> usize {
        self.project_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Graph emulation
// ---------------------------------------------------------------------------

fn id_from_gid(gid: &str) -> Option<i64> {
    gid.rsplit('/').next()?.parse().ok()
}

fn iid_variable(variables: &Value, key: &str) -> Option<i64> {
    variables.get(key)?.as_str()?.parse().ok()
}

impl MockTracker {
    async fn hierarchy_batch(&self, query: &str) -> TrackerResult<GraphQlResponse> {
        let alias_re = Regex::new(r#"(item_\d+): workItem\(id: "([^"]+)"\)"#)
            .map_err(|e| TrackerError::Parse(e.to_string()))?;
        let requested: Vec<(String, i64)> = alias_re
            .captures_iter(query)
            .filter_map(|c| Some((c[1].to_string(), id_from_gid(&c[2])?)))
            .collect();

        let failing = self.failing_work_items.read().await;
        if requested.iter().any(|(_, id)| failing.contains(id)) {
            return Ok(GraphQlResponse::from_errors([
                "Query has complexity of 300, which exceeds max complexity of 250",
            ]));
        }

        let issues = self.issues.read().await;
        let parents = self.parents.read().await;
        let projects = self.projects.read().await;
        let hidden = self.graph_hidden_projects.read().await;

        let mut data = Map::new();
        for (alias, id) in requested {
            let Some(issue) = issues.iter().find(|i| i.id == id) else {
                data.insert(alias, Value::Null);
                continue;
            };

            let mut children: Vec<&Issue> = issues
                .iter()
                .filter(|c| parents.get(&c.id) == Some(&id))
                .collect();
            children.sort_by_key(|c| c.id);
            let nodes: Vec<Value> = children
                .iter()
                .map(|c| json!({"id": work_item_gid(c.id), "iid": c.iid.to_string()}))
                .collect();

            let project = match projects.get(&issue.project_id) {
                Some(p) if !hidden.contains(&issue.project_id) => {
                    json!({"nameWithNamespace": p.name_with_namespace})
                }
                _ => Value::Null,
            };

            data.insert(
                alias,
                json!({
                    "id": work_item_gid(id),
                    "project": project,
                    "widgets": [
                        {},
                        {"children": {"count": nodes.len(), "nodes": nodes}}
                    ]
                }),
            );
        }
        Ok(GraphQlResponse::from_data(Value::Object(data)))
    }

    async fn work_item_lookup(&self, variables: &Value) -> TrackerResult<GraphQlResponse> {
        let project_id = variables
            .get("projectIds")
            .and_then(|v| v.get(0))
            .and_then(Value::as_str)
            .and_then(id_from_gid);
        let issues = self.issues.read().await;

        let Some(project_id) = project_id.filter(|pid| issues.iter().any(|i| i.project_id == *pid))
        else {
            return Ok(GraphQlResponse::from_data(json!({"projects": {"nodes": []}})));
        };

        let lookup = |iid: Option<i64>| {
            let nodes: Vec<Value> = iid
                .and_then(|iid| {
                    issues
                        .iter()
                        .find(|i| i.project_id == project_id && i.iid == iid)
                })
                .map(|i| vec![json!({"id": work_item_gid(i.id)})])
                .unwrap_or_default();
            json!({"nodes": nodes})
        };

        let mut node = Map::new();
        node.insert("child".into(), lookup(iid_variable(variables, "childIID")));
        if variables.get("parentIID").is_some() {
            node.insert("parent".into(), lookup(iid_variable(variables, "parentIID")));
        }
        Ok(GraphQlResponse::from_data(
            json!({"projects": {"nodes": [Value::Object(node)]}}),
        ))
    }

    async fn work_item_update(&self, variables: &Value) -> TrackerResult<GraphQlResponse> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(errors) = self.rejected_mutation.read().await.clone() {
            return Ok(GraphQlResponse::from_data(
                json!({"workItemUpdate": {"errors": errors}}),
            ));
        }

        let child = variables
            .get("id")
            .and_then(Value::as_str)
            .and_then(id_from_gid)
            .ok_or_else(|| TrackerError::GraphQuery(vec!["invalid work item id".into()]))?;
        let parent = variables
            .get("parentId")
            .and_then(Value::as_str)
            .and_then(id_from_gid);

        let mut parents = self.parents.write().await;
        match parent {
            Some(parent) => {
                parents.insert(child, parent);
            }
            None => {
                parents.remove(&child);
            }
        }
        Ok(GraphQlResponse::from_data(
            json!({"workItemUpdate": {"errors": []}}),
        ))
    }
}

// ---------------------------------------------------------------------------
// TrackerClient implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl TrackerClient for MockTracker {
    async fn list_issue_notes(
        &self,
        project_id: i64,
        issue_iid: i64,
        opts: NoteListOptions,
    ) -> TrackerResult<Vec<Note>> {
        let delay = self
            .note_delays
            .read()
            .await
            .get(&(project_id, issue_iid))
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.notes_served.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_notes
            .read()
            .await
            .contains(&(project_id, issue_iid))
        {
            return Err(TrackerError::status(500, "notes unavailable"));
        }

        let mut notes = self
            .notes
            .read()
            .await
            .get(&(project_id, issue_iid))
            .cloned()
            .unwrap_or_default();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notes.truncate(opts.per_page as usize);
        Ok(notes)
    }

    async fn list_label_events(
        &self,
        project_id: i64,
        issue_iid: i64,
        _page: u32,
        per_page: u32,
    ) -> TrackerResult<Vec<LabelEvent>> {
        if self
            .failing_label_events
            .read()
            .await
            .contains(&(project_id, issue_iid))
        {
            return Err(TrackerError::status(503, "label events unavailable"));
        }
        let mut events = self
            .label_events
            .read()
            .await
            .get(&(project_id, issue_iid))
            .cloned()
            .unwrap_or_default();
        events.truncate(per_page as usize);
        Ok(events)
    }

    async fn get_project(&self, project_id: i64) -> TrackerResult<Project> {
        self.project_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_projects.read().await.contains(&project_id) {
            return Err(TrackerError::status(500, "project lookup failed"));
        }
        self.projects
            .read()
            .await
            .get(&project_id)
            .cloned()
            .ok_or_else(|| TrackerError::status(404, "404 Project Not Found"))
    }

    async fn list_issues(&self, opts: &IssueListOptions) -> TrackerResult<Vec<Issue>> {
        if *self.list_fails.read().await {
            return Err(TrackerError::status(500, "listing failed"));
        }
        let issues = self.issues.read().await;
        let mut matched: Vec<Issue> = issues
            .iter()
            .filter(|i| opts.iids.is_empty() || opts.iids.contains(&i.iid))
            .filter(|i| {
                opts.labels
                    .iter()
                    .all(|l| i.labels.iter().any(|label| label.name() == l))
            })
            .filter(|i| {
                opts.search
                    .as_ref()
                    .is_none_or(|s| i.title.to_lowercase().contains(&s.to_lowercase()))
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(per_page) = opts.per_page {
            matched.truncate(per_page as usize);
        }
        Ok(matched)
    }

    async fn get_issue(&self, project_id: i64, issue_iid: i64) -> TrackerResult<Issue> {
        self.issues
            .read()
            .await
            .iter()
            .find(|i| i.project_id == project_id && i.iid == issue_iid)
            .cloned()
            .ok_or_else(|| {
                TrackerError::NotFound(format!("issue #{issue_iid} in project {project_id}"))
            })
    }

    async fn create_issue(&self, project_id: i64, new_issue: &NewIssue) -> TrackerResult<Issue> {
        if self.failing_create.read().await.contains(&new_issue.title) {
            return Err(TrackerError::status(400, "title is invalid"));
        }
        let mut issues = self.issues.write().await;
        let id = issues.iter().map(|i| i.id).max().unwrap_or(1000) + 1;
        let iid = issues
            .iter()
            .filter(|i| i.project_id == project_id)
            .map(|i| i.iid)
            .max()
            .unwrap_or(0)
            + 1;

        let mut extra = Map::new();
        if let Some(description) = &new_issue.description {
            extra.insert("description".into(), json!(description));
        }
        extra.insert(
            "issue_type".into(),
            json!(new_issue.issue_type.as_deref().unwrap_or("issue")),
        );
        let issue = Issue {
            id,
            iid,
            project_id,
            title: new_issue.title.clone(),
            web_url: format!("https://tracker.test/p/{project_id}/-/issues/{iid}"),
            updated_at: Some(chrono::Utc::now()),
            labels: new_issue
                .labels
                .iter()
                .map(|l| IssueLabel::from(l.as_str()))
                .collect(),
            extra,
        };
        issues.push(issue.clone());
        Ok(issue)
    }

    async fn graphql(&self, request: &GraphQlRequest) -> TrackerResult<GraphQlResponse> {
        self.graphql_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.graph_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if request.query.contains("workItemUpdate") {
            self.work_item_update(&request.variables).await
        } else if request.query.contains("projects(ids:") {
            self.work_item_lookup(&request.variables).await
        } else {
            self.hierarchy_batch(&request.query).await
        }
    }
}
