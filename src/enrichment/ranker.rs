//! Activity ranking
//!
//! Picks the single most representative activity of an issue from its notes
//! and label events. The policy is plain data so it can be tested without
//! any fetching.

use super::models::{ActivityKind, ActivityRecord};
use crate::tracker::models::{LabelAction, LabelEvent, Note};

/// Priorities per activity kind plus the markers that promote a system note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingPolicy {
    pub comment: u8,
    pub system_note: u8,
    pub important_system_note: u8,
    pub label_event: u8,
    /// Lower-case substrings that mark a system note as important.
    pub importance_markers: Vec<&'static str>,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            comment: 3,
            system_note: 0,
            important_system_note: 2,
            label_event: 2,
            importance_markers: vec![
                "closed",
                "reopened",
                "label",
                "mentioned in",
                "changed title",
            ],
        }
    }
}

impl RankingPolicy {
    /// Base priority of a kind. System notes are further adjusted by
    /// [`RankingPolicy::is_important`].
    pub fn base_priority(&self, kind: ActivityKind) -> u8 {
        match kind {
            ActivityKind::Comment => self.comment,
            ActivityKind::SystemNote => self.system_note,
            ActivityKind::LabelEvent => self.label_event,
        }
    }

    /// Whether a system note body matches one of the importance markers.
    ///
    /// Cross-reference notes ("mentioned this issue in #4") count as
    /// "mentioned in".
    pub fn is_important(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        if self.importance_markers.contains(&"mentioned in") && body.starts_with("mentioned") {
            return true;
        }
        self.importance_markers.iter().any(|m| body.contains(m))
    }

    pub fn note_record(&self, note: &Note) -> ActivityRecord {
        let (kind, priority) = if !note.system {
            (ActivityKind::Comment, self.comment)
        } else if self.is_important(&note.body) {
            (ActivityKind::SystemNote, self.important_system_note)
        } else {
            (ActivityKind::SystemNote, self.system_note)
        };

        ActivityRecord {
            kind,
            actor_name: note.author.name.clone(),
            actor_avatar: note.author.avatar_url.clone(),
            description: note.body.clone(),
            created_at: note.created_at,
            is_system: note.system,
            priority,
        }
    }

    pub fn label_event_record(&self, event: &LabelEvent) -> ActivityRecord {
        let verb = match event.action {
            LabelAction::Add => "added",
            LabelAction::Remove => "removed",
        };
        let label = event
            .label
            .as_ref()
            .map(|l| l.name.as_str())
            .unwrap_or("(deleted label)");

        ActivityRecord {
            kind: ActivityKind::LabelEvent,
            actor_name: event.user.name.clone(),
            actor_avatar: event.user.avatar_url.clone(),
            description: format!("{verb} label {label}"),
            created_at: event.created_at,
            is_system: true,
            priority: self.base_priority(ActivityKind::LabelEvent),
        }
    }

    /// Best record among `notes` then `events`, or `None` when both are empty.
    ///
    /// Higher priority wins, then a strictly later timestamp. Full ties keep
    /// the earliest record, notes before label events.
    pub fn select_best(&self, notes: &[Note], events: &[LabelEvent]) -> Option<ActivityRecord> {
        let records = notes
            .iter()
            .map(|n| self.note_record(n))
            .chain(events.iter().map(|e| self.label_event_record(e)));

        records.fold(None, |best: Option<ActivityRecord>, candidate| match best {
            Some(current) if !outranks(&candidate, &current) => Some(current),
            _ => Some(candidate),
        })
    }
}

fn outranks(candidate: &ActivityRecord, current: &ActivityRecord) -> bool {
    candidate.priority > current.priority
        || (candidate.priority == current.priority && candidate.created_at > current.created_at)
}

/// [`RankingPolicy::select_best`] under the default policy.
pub fn select_best_activity(notes: &[Note], events: &[LabelEvent]) -> Option<ActivityRecord> {
    RankingPolicy::default().select_best(notes, events)
}
