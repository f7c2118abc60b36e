//! Activity aggregation across a batch of issues

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use super::models::{ActivityFeedItem, ACTIVITY_FETCH_FAILED, NO_RECENT_ACTIVITY};
use super::ranker::RankingPolicy;
use crate::tracker::models::{Issue, NoteListOptions};
use crate::tracker::TrackerClient;

pub const DEFAULT_NOTES_LIMIT: u32 = 20;
pub const DEFAULT_LABEL_EVENTS_LIMIT: u32 = 10;

/// How much history to fetch per issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityLimits {
    pub notes: u32,
    pub label_events: u32,
}

impl Default for ActivityLimits {
    fn default() -> Self {
        Self {
            notes: DEFAULT_NOTES_LIMIT,
            label_events: DEFAULT_LABEL_EVENTS_LIMIT,
        }
    }
}

/// Builds one feed entry per issue from its notes and label events.
pub struct ActivityAggregator {
    tracker: Arc<dyn TrackerClient>,
    limits: ActivityLimits,
    policy: RankingPolicy,
}

impl ActivityAggregator {
    pub fn new(tracker: Arc<dyn TrackerClient>, limits: ActivityLimits) -> Self {
        Self {
            tracker,
            limits,
            policy: RankingPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RankingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// One entry per input issue, in input order.
    ///
    /// Every issue is processed concurrently. A failed fetch degrades that
    /// issue's entry and never the batch. Dropping the returned future
    /// cancels all in-flight fetches.
    pub async fn aggregate(&self, issues: &[Issue]) -> Vec<ActivityFeedItem> {
        let mut feed: Vec<ActivityFeedItem> = issues
            .iter()
            .map(|issue| ActivityFeedItem::base(issue, NO_RECENT_ACTIVITY))
            .collect();

        let mut tasks: FuturesUnordered<_> = issues
            .iter()
            .enumerate()
            .map(|(idx, issue)| async move { (idx, self.issue_activity(issue).await) })
            .collect();

        while let Some((idx, item)) = tasks.next().await {
            feed[idx] = item;
        }

        debug!(issues = issues.len(), "Aggregated activity feed");
        feed
    }

    async fn issue_activity(&self, issue: &Issue) -> ActivityFeedItem {
        let (notes, events) = tokio::join!(
            self.tracker.list_issue_notes(
                issue.project_id,
                issue.iid,
                NoteListOptions::first_page(self.limits.notes),
            ),
            self.tracker.list_label_events(
                issue.project_id,
                issue.iid,
                1,
                self.limits.label_events,
            ),
        );

        match (notes, events) {
            (Ok(notes), Ok(events)) => match self.policy.select_best(&notes, &events) {
                Some(record) => ActivityFeedItem::from_record(issue, record),
                None => ActivityFeedItem::base(issue, NO_RECENT_ACTIVITY),
            },
            (notes, events) => {
                warn!(
                    project_id = issue.project_id,
                    issue_iid = issue.iid,
                    notes_error = ?notes.err(),
                    label_events_error = ?events.err(),
                    "Activity fetch failed"
                );
                ActivityFeedItem::base(issue, ACTIVITY_FETCH_FAILED)
            }
        }
    }
}
