use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::issue_history::{TimelineEvent, TimelineEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ActivityRole` values.
pub enum ActivityRole {
    Author,
    Maintainer,
    OtherUser,
}

impl ActivityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Maintainer => "maintainer",
            Self::OtherUser => "other_user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Current activity summary of one issue, derived from its timeline.
pub struct ActivityState {
    pub last_action_role: ActivityRole,
    pub last_activity_time: DateTime<Utc>,
    pub last_action_kind: TimelineEventKind,
    pub last_actor: String,
    pub last_comment_text: Option<String>,
}

impl ActivityState {
    fn apply(&mut self, event: &TimelineEvent, role: ActivityRole) {
        self.last_action_role = role;
        self.last_activity_time = event.timestamp;
        self.last_action_kind = event.kind;
        self.last_actor = event.actor.clone();
        self.last_comment_text = comment_text(event);
    }
}

fn comment_text(event: &TimelineEvent) -> Option<String> {
    match event.kind {
        TimelineEventKind::Commented => event.payload.clone(),
        _ => None,
    }
}

pub fn classify_actor_role(actor: &str, issue_author: &str, maintainers: &[String]) -> ActivityRole {
    if actor == issue_author {
        ActivityRole::Author
    } else if maintainers.iter().any(|maintainer| maintainer == actor) {
        ActivityRole::Maintainer
    } else {
        ActivityRole::OtherUser
    }
}

/// Folds an ordered timeline into the state left behind by its last event.
///
/// The first event seeds the state as the author's action. Every later event
/// overwrites it unconditionally; only `commented` events carry a comment
/// preview forward. Returns `None` for an empty timeline.
pub fn replay_activity_state(
    timeline: &[TimelineEvent],
    maintainers: &[String],
    issue_author: &str,
) -> Option<ActivityState> {
    let (first, rest) = timeline.split_first()?;
    let mut state = ActivityState {
        last_action_role: ActivityRole::Author,
        last_activity_time: first.timestamp,
        last_action_kind: first.kind,
        last_actor: issue_author.to_string(),
        last_comment_text: comment_text(first),
    };
    for event in rest {
        let role = classify_actor_role(&event.actor, issue_author, maintainers);
        state.apply(event, role);
    }
    Some(state)
}
