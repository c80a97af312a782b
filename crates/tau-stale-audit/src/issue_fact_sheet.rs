//! Decision-ready fact sheet derived from an issue snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::audit_policy::StaleAuditPolicy;
use crate::issue_history::{build_issue_history, TimelineEventKind};
use crate::issue_replay::{replay_activity_state, ActivityRole, ActivityState};
use crate::issue_snapshot::IssueSnapshot;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Facts handed to the decision agent. Thresholding is left to the agent.
pub struct FactSheet {
    pub issue_number: u64,
    pub issue_author: String,
    pub last_action_role: ActivityRole,
    pub last_action_type: TimelineEventKind,
    pub last_actor_name: String,
    pub last_activity_at: DateTime<Utc>,
    pub maintainer_alert_needed: bool,
    pub is_stale: bool,
    pub days_since_activity: f64,
    pub days_since_stale_label: f64,
    pub last_comment_text: Option<String>,
    pub current_labels: Vec<String>,
    pub stale_threshold_days: f64,
    pub close_threshold_days: f64,
    pub maintainers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
/// Outcome of one analysis call; serializes as `{"status": "success", ...}`
/// or `{"status": "error", "error": ...}`.
pub enum IssueAnalysis {
    Success(FactSheet),
    Error { error: String },
}

impl IssueAnalysis {
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            error: reason.into(),
        }
    }

    pub fn fact_sheet(&self) -> Option<&FactSheet> {
        match self {
            Self::Success(fact_sheet) => Some(fact_sheet),
            Self::Error { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|error| {
            serde_json::json!({
                "status": "error",
                "error": format!("failed to serialize issue analysis: {error}"),
            })
        })
    }
}

/// Fractional days elapsed from `earlier` to `now`.
pub fn days_between(earlier: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    now.signed_duration_since(earlier).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// True when a non-maintainer silently edited the description and no bot
/// alert has been posted since that edit.
pub fn maintainer_alert_needed(
    state: &ActivityState,
    last_bot_alert_at: Option<DateTime<Utc>>,
) -> bool {
    let role_qualifies = matches!(
        state.last_action_role,
        ActivityRole::Author | ActivityRole::OtherUser
    );
    let ghost_edit = state.last_action_kind == TimelineEventKind::EditedDescription;
    let not_yet_alerted = match last_bot_alert_at {
        Some(alerted_at) => alerted_at < state.last_activity_time,
        None => true,
    };
    role_qualifies && ghost_edit && not_yet_alerted
}

/// Builds the fact sheet for `snapshot`, using `now` for every day count.
pub fn build_fact_sheet(
    snapshot: &IssueSnapshot,
    maintainers: &[String],
    policy: &StaleAuditPolicy,
    now: DateTime<Utc>,
) -> IssueAnalysis {
    let history = build_issue_history(snapshot, policy);
    let Some(state) = replay_activity_state(&history.events, maintainers, &snapshot.author) else {
        return IssueAnalysis::error(format!(
            "issue #{} produced an empty activity timeline",
            snapshot.number
        ));
    };

    let is_stale = snapshot.has_label(&policy.stale_label_name);
    let days_since_stale_label = match (is_stale, history.latest_stale_label_at()) {
        (true, Some(labelled_at)) => days_between(labelled_at, now),
        _ => 0.0,
    };

    IssueAnalysis::Success(FactSheet {
        issue_number: snapshot.number,
        issue_author: snapshot.author.clone(),
        last_action_role: state.last_action_role,
        last_action_type: state.last_action_kind,
        last_actor_name: state.last_actor.clone(),
        last_activity_at: state.last_activity_time,
        maintainer_alert_needed: maintainer_alert_needed(&state, history.last_bot_alert_at),
        is_stale,
        days_since_activity: days_between(state.last_activity_time, now),
        days_since_stale_label,
        last_comment_text: state.last_comment_text,
        current_labels: snapshot.labels.clone(),
        stale_threshold_days: policy.stale_threshold_days(),
        close_threshold_days: policy.close_threshold_days(),
        maintainers: maintainers.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    use super::{build_fact_sheet, days_between, IssueAnalysis};
    use crate::audit_policy::StaleAuditPolicy;
    use crate::issue_history::TimelineEventKind;
    use crate::issue_replay::ActivityRole;
    use crate::issue_snapshot::{
        DescriptionEdit, IssueSnapshot, SnapshotComment, SnapshotTimelineItem,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn hours_ago(hours: i64) -> DateTime<Utc> {
        now() - Duration::hours(hours)
    }

    fn snapshot(created_hours_ago: i64) -> IssueSnapshot {
        IssueSnapshot {
            number: 11,
            author: "alice".to_string(),
            created_at: hours_ago(created_hours_ago),
            labels: vec!["bug".to_string()],
            comments: Vec::new(),
            description_edits: Vec::new(),
            timeline_items: Vec::new(),
        }
    }

    fn maintainers() -> Vec<String> {
        vec!["maya".to_string()]
    }

    fn success(analysis: IssueAnalysis) -> super::FactSheet {
        match analysis {
            IssueAnalysis::Success(fact_sheet) => fact_sheet,
            IssueAnalysis::Error { error } => panic!("unexpected analysis error: {error}"),
        }
    }

    #[test]
    fn functional_build_fact_sheet_reports_days_for_untouched_issue() {
        let policy = StaleAuditPolicy::default();
        let fact_sheet = success(build_fact_sheet(&snapshot(200), &maintainers(), &policy, now()));
        assert!((fact_sheet.days_since_activity - 8.333).abs() < 0.01);
        assert!(!fact_sheet.is_stale);
        assert_eq!(fact_sheet.days_since_stale_label, 0.0);
        assert_eq!(fact_sheet.last_action_role, ActivityRole::Author);
        assert_eq!(fact_sheet.last_action_type, TimelineEventKind::Created);
        assert!(!fact_sheet.maintainer_alert_needed);
        assert_eq!(fact_sheet.stale_threshold_days, 7.0);
        assert_eq!(fact_sheet.close_threshold_days, 7.0);
        assert_eq!(fact_sheet.maintainers, maintainers());
    }

    #[test]
    fn functional_build_fact_sheet_uses_latest_stale_label_time() {
        let policy = StaleAuditPolicy::default();
        let mut issue = snapshot(500);
        issue.labels.push("stale".to_string());
        issue.timeline_items = vec![
            SnapshotTimelineItem::LabelApplied {
                label: "stale".to_string(),
                actor: "adk-bot".to_string(),
                created_at: hours_ago(300),
            },
            SnapshotTimelineItem::LabelApplied {
                label: "stale".to_string(),
                actor: "adk-bot".to_string(),
                created_at: hours_ago(48),
            },
        ];

        let fact_sheet = success(build_fact_sheet(&issue, &maintainers(), &policy, now()));
        assert!(fact_sheet.is_stale);
        assert!((fact_sheet.days_since_stale_label - 2.0).abs() < 1e-9);
    }

    #[test]
    fn regression_build_fact_sheet_ignores_stale_times_when_label_removed() {
        let policy = StaleAuditPolicy::default();
        let mut issue = snapshot(500);
        issue.timeline_items = vec![SnapshotTimelineItem::LabelApplied {
            label: "stale".to_string(),
            actor: "adk-bot".to_string(),
            created_at: hours_ago(48),
        }];
        let fact_sheet = success(build_fact_sheet(&issue, &maintainers(), &policy, now()));
        assert!(!fact_sheet.is_stale);
        assert_eq!(fact_sheet.days_since_stale_label, 0.0);
    }

    #[test]
    fn functional_build_fact_sheet_requests_alert_for_author_ghost_edit() {
        let policy = StaleAuditPolicy::default();
        let mut issue = snapshot(400);
        issue.comments = vec![SnapshotComment {
            author: "maya".to_string(),
            body: "needs repro".to_string(),
            created_at: hours_ago(300),
            last_edited_at: None,
        }];
        issue.description_edits = vec![DescriptionEdit {
            editor: "alice".to_string(),
            edited_at: hours_ago(10),
        }];

        let fact_sheet = success(build_fact_sheet(&issue, &maintainers(), &policy, now()));
        assert_eq!(fact_sheet.last_action_type, TimelineEventKind::EditedDescription);
        assert!(fact_sheet.maintainer_alert_needed);
    }

    #[test]
    fn regression_build_fact_sheet_suppresses_duplicate_alert_after_prior_notification() {
        let policy = StaleAuditPolicy::default();
        let mut issue = snapshot(400);
        issue.description_edits = vec![DescriptionEdit {
            editor: "alice".to_string(),
            edited_at: hours_ago(10),
        }];
        issue.comments = vec![SnapshotComment {
            author: "adk-bot".to_string(),
            body: format!("{}. Maintainers, please review.", policy.bot_alert_signature),
            created_at: hours_ago(5),
            last_edited_at: None,
        }];

        let fact_sheet = success(build_fact_sheet(&issue, &maintainers(), &policy, now()));
        assert_eq!(fact_sheet.last_action_type, TimelineEventKind::EditedDescription);
        assert!(!fact_sheet.maintainer_alert_needed);
    }

    #[test]
    fn functional_build_fact_sheet_alerts_again_for_edit_after_older_notification() {
        let policy = StaleAuditPolicy::default();
        let mut issue = snapshot(400);
        issue.description_edits = vec![DescriptionEdit {
            editor: "alice".to_string(),
            edited_at: hours_ago(10),
        }];
        issue.comments = vec![SnapshotComment {
            author: "adk-bot".to_string(),
            body: policy.bot_alert_signature.clone(),
            created_at: hours_ago(50),
            last_edited_at: None,
        }];
        let fact_sheet = success(build_fact_sheet(&issue, &maintainers(), &policy, now()));
        assert!(fact_sheet.maintainer_alert_needed);
    }

    #[test]
    fn unit_build_fact_sheet_never_alerts_for_maintainer_edits() {
        let policy = StaleAuditPolicy::default();
        let mut issue = snapshot(400);
        issue.description_edits = vec![DescriptionEdit {
            editor: "maya".to_string(),
            edited_at: hours_ago(1),
        }];
        let fact_sheet = success(build_fact_sheet(&issue, &maintainers(), &policy, now()));
        assert_eq!(fact_sheet.last_action_role, ActivityRole::Maintainer);
        assert!(!fact_sheet.maintainer_alert_needed);
    }

    #[test]
    fn unit_issue_analysis_serializes_status_tags() {
        let error = IssueAnalysis::error("network error: boom").to_json();
        assert_eq!(
            error,
            json!({ "status": "error", "error": "network error: boom" })
        );

        let policy = StaleAuditPolicy::default();
        let value = build_fact_sheet(&snapshot(24), &maintainers(), &policy, now()).to_json();
        assert_eq!(value["status"], "success");
        assert_eq!(value["last_action_role"], "author");
        assert_eq!(value["last_action_type"], "created");
        assert_eq!(value["last_comment_text"], serde_json::Value::Null);
    }

    #[test]
    fn unit_days_between_is_fractional() {
        assert_eq!(days_between(hours_ago(36), now()), 1.5);
    }
}
