//! Issue enrichment engine
//!
//! Derives what the tracker's REST API does not expose directly: a "last
//! activity" summary per issue and the parent/child work item hierarchy.

pub mod activity;
pub mod hierarchy;
pub mod linker;
pub mod models;
pub mod ranker;

pub use activity::{ActivityAggregator, ActivityLimits};
pub use hierarchy::{HierarchyReport, HierarchyResolver, DEFAULT_HIERARCHY_BATCH_SIZE};
pub use linker::{ChildIssueError, HierarchyLinker, LinkError, LinkStep};
pub use ranker::{select_best_activity, RankingPolicy};
