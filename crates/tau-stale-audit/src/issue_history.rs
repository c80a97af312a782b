use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit_policy::StaleAuditPolicy;
use crate::issue_snapshot::{IssueSnapshot, SnapshotTimelineItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `TimelineEventKind` values.
pub enum TimelineEventKind {
    Created,
    Commented,
    EditedDescription,
    RelabeledStale,
    RenamedTitle,
    Reopened,
}

impl TimelineEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Commented => "commented",
            Self::EditedDescription => "edited_description",
            Self::RelabeledStale => "relabeled_stale",
            Self::RenamedTitle => "renamed_title",
            Self::Reopened => "reopened",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One entry of an issue's activity timeline.
pub struct TimelineEvent {
    pub kind: TimelineEventKind,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Option<String>,
}

impl TimelineEvent {
    pub fn new(kind: TimelineEventKind, actor: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            actor: actor.into(),
            timestamp,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// Ordered human activity plus the auxiliary signals tracked beside it.
pub struct IssueHistory {
    pub events: Vec<TimelineEvent>,
    pub stale_label_times: Vec<DateTime<Utc>>,
    pub last_bot_alert_at: Option<DateTime<Utc>>,
}

impl IssueHistory {
    pub fn latest_stale_label_at(&self) -> Option<DateTime<Utc>> {
        self.stale_label_times.iter().max().copied()
    }
}

/// Merges comments, description edits and timeline items into one
/// chronologically ordered timeline.
///
/// The first emitted event is always a synthetic `created` event, so the
/// result is never empty. Bot-alert comments and stale-label applications are
/// routed to the auxiliary fields and never appear in `events`. Events that
/// share a timestamp keep their emission order.
pub fn build_issue_history(snapshot: &IssueSnapshot, policy: &StaleAuditPolicy) -> IssueHistory {
    let mut events = vec![TimelineEvent::new(
        TimelineEventKind::Created,
        snapshot.author.clone(),
        snapshot.created_at,
    )];
    let mut stale_label_times = Vec::new();
    let mut last_bot_alert_at: Option<DateTime<Utc>> = None;

    for comment in &snapshot.comments {
        if comment.body.contains(policy.bot_alert_signature.as_str()) {
            last_bot_alert_at = Some(match last_bot_alert_at {
                Some(current) => current.max(comment.created_at),
                None => comment.created_at,
            });
            continue;
        }
        if policy.is_bot_actor(&comment.author) {
            continue;
        }
        // A later edit of a comment is itself a fresh human signal.
        let occurred_at = comment.last_edited_at.unwrap_or(comment.created_at);
        events.push(
            TimelineEvent::new(
                TimelineEventKind::Commented,
                comment.author.clone(),
                occurred_at,
            )
            .with_payload(comment.body.clone()),
        );
    }

    for edit in &snapshot.description_edits {
        if policy.is_bot_actor(&edit.editor) {
            continue;
        }
        events.push(TimelineEvent::new(
            TimelineEventKind::EditedDescription,
            edit.editor.clone(),
            edit.edited_at,
        ));
    }

    for item in &snapshot.timeline_items {
        let (kind, actor, created_at) = match item {
            SnapshotTimelineItem::LabelApplied {
                label, created_at, ..
            } => {
                if *label == policy.stale_label_name {
                    stale_label_times.push(*created_at);
                }
                continue;
            }
            SnapshotTimelineItem::TitleRenamed { actor, created_at } => {
                (TimelineEventKind::RenamedTitle, actor, created_at)
            }
            SnapshotTimelineItem::Reopened { actor, created_at } => {
                (TimelineEventKind::Reopened, actor, created_at)
            }
        };
        if policy.is_bot_actor(actor) {
            continue;
        }
        events.push(TimelineEvent::new(kind, actor.clone(), *created_at));
    }

    events.sort_by_key(|event| event.timestamp);

    IssueHistory {
        events,
        stale_label_times,
        last_bot_alert_at,
    }
}
