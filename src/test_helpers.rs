//! Test helper factories and mock state builders
//!
//! Convenience constructors for tracker records with sensible defaults, and
//! builders for AppState / ServerState backed by the in-memory tracker.
#![allow(dead_code)]

use crate::api::handlers::{ApiState, ServerState};
use crate::tracker::mock::MockTracker;
use crate::tracker::models::*;
use crate::{AppState, Config};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Map;
use std::sync::Arc;

// ============================================================================
// Mock state builders
// ============================================================================

pub fn test_config() -> Config {
    Config {
        server_port: 0,
        tracker_base_url: "http://tracker.test".to_string(),
        tracker_token: "test-token".to_string(),
        tracker_timeout_secs: 5,
        notes_limit: 20,
        label_events_limit: 10,
        hierarchy_batch_size: 5,
        dashboard_issue_limit: 5,
    }
}

/// AppState over the given mock tracker
pub fn mock_app_state(tracker: Arc<MockTracker>) -> AppState {
    AppState::with_tracker(tracker, test_config())
}

/// Router state over the given mock tracker
pub fn mock_server_state(tracker: Arc<MockTracker>) -> ApiState {
    Arc::new(ServerState::new(&mock_app_state(tracker)))
}

// ============================================================================
// Record factories
// ============================================================================

/// Fixed point in time, `secs` seconds after 2026-03-01T00:00:00Z.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

pub fn user(name: &str) -> UserRef {
    UserRef {
        name: name.to_string(),
        username: name.to_lowercase(),
        avatar_url: format!("https://avatars.test/{}.png", name.to_lowercase()),
    }
}

pub fn make_issue(id: i64, iid: i64, project_id: i64) -> Issue {
    Issue {
        id,
        iid,
        project_id,
        title: format!("Issue #{iid}"),
        web_url: format!("https://tracker.test/p/{project_id}/-/issues/{iid}"),
        updated_at: Some(ts(0)),
        labels: Vec::new(),
        extra: Map::new(),
    }
}

pub fn make_note(author: &str, body: &str, created_at: DateTime<Utc>) -> Note {
    Note {
        id: created_at.timestamp(),
        body: body.to_string(),
        author: user(author),
        system: false,
        created_at,
    }
}

pub fn make_system_note(body: &str, created_at: DateTime<Utc>) -> Note {
    Note {
        system: true,
        ..make_note("Administrator", body, created_at)
    }
}

pub fn make_label_event(
    actor: &str,
    label: Option<&str>,
    action: LabelAction,
    created_at: DateTime<Utc>,
) -> LabelEvent {
    LabelEvent {
        id: created_at.timestamp(),
        user: user(actor),
        label: label.map(|name| LabelRef {
            id: 1,
            name: name.to_string(),
        }),
        action,
        created_at,
    }
}
