//! Hierarchy batch resolution
//!
//! Children and project names are fetched through aliased graph queries, a
//! few work items per request. The tracker caps the computed cost of a
//! single query (250 on GitLab) and one hierarchy lookup costs close to 50,
//! so batches stay small. Issues whose project name is still unknown after
//! all batches get it from the REST project endpoint.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::models::{ChildRef, EnrichedIssue, HierarchyInfo};
use crate::tracker::models::{work_item_gid, GraphQlRequest, Issue};
use crate::tracker::{TrackerClient, TrackerResult};

/// Work items per graph request.
pub const DEFAULT_HIERARCHY_BATCH_SIZE: usize = 5;

const WORK_ITEM_SELECTION: &str = "id project { nameWithNamespace } widgets { ... on WorkItemWidgetHierarchy { children { count nodes { id iid } } } }";

fn alias(issue_id: i64) -> String {
    format!("item_{issue_id}")
}

/// One combined query for a batch, each work item under its own alias.
pub(crate) fn batch_query(batch: &[Issue]) -> String {
    let mut query = String::from("query {\n");
    for issue in batch {
        query.push_str(&format!(
            "  {}: workItem(id: \"{}\") {{ {} }}\n",
            alias(issue.id),
            work_item_gid(issue.id),
            WORK_ITEM_SELECTION
        ));
    }
    query.push('}');
    query
}

// ============================================================================
// Graph response shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct WorkItemNode {
    #[serde(default)]
    project: Option<ProjectNode>,
    #[serde(default)]
    widgets: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectNode {
    #[serde(default)]
    name_with_namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChildrenConnection {
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    nodes: Option<Vec<ChildRef>>,
}

impl WorkItemNode {
    fn project_name(&self) -> Option<&str> {
        self.project
            .as_ref()?
            .name_with_namespace
            .as_deref()
            .filter(|n| !n.is_empty())
    }

    /// Children from the first widget that carries children data.
    fn hierarchy(&self) -> HierarchyInfo {
        let children = self
            .widgets
            .iter()
            .flatten()
            .filter_map(|w| w.get("children").filter(|c| !c.is_null()))
            .find_map(|c| serde_json::from_value::<ChildrenConnection>(c.clone()).ok());

        match children {
            Some(conn) => {
                let items = conn.nodes.unwrap_or_default();
                HierarchyInfo {
                    amount: conn.count.unwrap_or(items.len()),
                    items,
                }
            }
            None => HierarchyInfo::default(),
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Outcome of one resolution pass. Every input issue has a hierarchy entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyReport {
    pub hierarchy: HashMap<i64, HierarchyInfo>,
    /// Keyed by issue id. Absent when neither path produced a name.
    pub project_names: HashMap<i64, String>,
    pub failed_batches: usize,
}

impl HierarchyReport {
    pub fn children_of(&self, issue_id: i64) -> HierarchyInfo {
        self.hierarchy.get(&issue_id).cloned().unwrap_or_default()
    }

    pub fn project_name(&self, issue_id: i64) -> &str {
        self.project_names
            .get(&issue_id)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Attach the resolved fields to each issue, preserving order.
    pub fn enrich(&self, issues: Vec<Issue>) -> Vec<EnrichedIssue> {
        issues
            .into_iter()
            .map(|issue| EnrichedIssue {
                project_name: self.project_name(issue.id).to_string(),
                child: self.children_of(issue.id),
                issue,
            })
            .collect()
    }
}

pub struct HierarchyResolver {
    tracker: Arc<dyn TrackerClient>,
    batch_size: usize,
}

impl HierarchyResolver {
    /// `batch_size` is clamped to at least one.
    pub fn new(tracker: Arc<dyn TrackerClient>, batch_size: usize) -> Self {
        Self {
            tracker,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Resolve children and project names for `issues`.
    ///
    /// Batches run one after another. A failed batch leaves its issues with
    /// no children and defers their project names to the REST fallback.
    pub async fn resolve(&self, issues: &[Issue]) -> HierarchyReport {
        let mut report = HierarchyReport::default();

        for (batch_idx, batch) in issues.chunks(self.batch_size).enumerate() {
            match self.fetch_batch(batch).await {
                Ok(data) => absorb_batch(&mut report, batch, &data),
                Err(e) => {
                    report.failed_batches += 1;
                    warn!(
                        batch = batch_idx,
                        size = batch.len(),
                        error = %e,
                        "Hierarchy batch query failed"
                    );
                }
            }
        }

        for issue in issues {
            report.hierarchy.entry(issue.id).or_default();
        }

        self.fill_missing_project_names(&mut report, issues).await;
        report
    }

    /// [`HierarchyResolver::resolve`] followed by [`HierarchyReport::enrich`].
    pub async fn resolve_hierarchy(&self, issues: Vec<Issue>) -> Vec<EnrichedIssue> {
        let report = self.resolve(&issues).await;
        report.enrich(issues)
    }

    async fn fetch_batch(&self, batch: &[Issue]) -> TrackerResult<Value> {
        let request = GraphQlRequest::new(batch_query(batch));
        self.tracker.graphql(&request).await?.into_data()
    }

    async fn fill_missing_project_names(&self, report: &mut HierarchyReport, issues: &[Issue]) {
        let mut seen = HashSet::new();
        let missing: Vec<i64> = issues
            .iter()
            .filter(|i| !report.project_names.contains_key(&i.id))
            .map(|i| i.project_id)
            .filter(|pid| seen.insert(*pid))
            .collect();
        if missing.is_empty() {
            return;
        }

        debug!(projects = ?missing, "Falling back to REST for project names");
        let lookups = join_all(missing.iter().map(|pid| self.tracker.get_project(*pid))).await;

        let mut names = HashMap::new();
        for (project_id, result) in missing.into_iter().zip(lookups) {
            match result {
                Ok(project) => {
                    names.insert(project_id, project.display_name().to_string());
                }
                Err(e) => warn!(project_id, error = %e, "Project name fallback failed"),
            }
        }

        for issue in issues {
            if report.project_names.contains_key(&issue.id) {
                continue;
            }
            if let Some(name) = names.get(&issue.project_id).filter(|n| !n.is_empty()) {
                report.project_names.insert(issue.id, name.clone());
            }
        }
    }
}

fn absorb_batch(report: &mut HierarchyReport, batch: &[Issue], data: &Value) {
    for issue in batch {
        let Some(raw) = data.get(alias(issue.id)).filter(|v| !v.is_null()) else {
            continue;
        };
        let node: WorkItemNode = match serde_json::from_value(raw.clone()) {
            Ok(node) => node,
            Err(e) => {
                debug!(issue_id = issue.id, error = %e, "Unreadable work item in batch");
                continue;
            }
        };
        if let Some(name) = node.project_name() {
            report.project_names.insert(issue.id, name.to_string());
        }
        report.hierarchy.insert(issue.id, node.hierarchy());
    }
}
