//! Typed issue snapshot and its decoding from the issue-history query payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit_policy::HistoryWindows;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `SnapshotComment` used across Tau components.
pub struct SnapshotComment {
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub last_edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A silent edit of the issue description.
pub struct DescriptionEdit {
    pub editor: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// Enumerates the timeline item kinds requested by the snapshot query.
pub enum SnapshotTimelineItem {
    LabelApplied {
        label: String,
        actor: String,
        created_at: DateTime<Utc>,
    },
    TitleRenamed {
        actor: String,
        created_at: DateTime<Utc>,
    },
    Reopened {
        actor: String,
        created_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Everything the engine knows about one issue, fetched in a single query.
///
/// Each list only holds the most recent items permitted by its
/// [`HistoryWindows`] bound; older history is not visible.
pub struct IssueSnapshot {
    pub number: u64,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub labels: Vec<String>,
    pub comments: Vec<SnapshotComment>,
    pub description_edits: Vec<DescriptionEdit>,
    pub timeline_items: Vec<SnapshotTimelineItem>,
}

impl IssueSnapshot {
    /// Decodes the `repository.issue` node of the snapshot query.
    pub fn from_graphql_issue(number: u64, issue: Value) -> Result<Self, serde_json::Error> {
        let node: GraphqlIssueNode = serde_json::from_value(issue)?;
        Ok(node.into_snapshot(number))
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label == name)
    }
}

pub const ISSUE_SNAPSHOT_QUERY: &str = r#"
query($owner: String!, $name: String!, $number: Int!, $labelLimit: Int!, $commentLimit: Int!, $timelineLimit: Int!, $editLimit: Int!) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) {
      author { login }
      createdAt
      labels(first: $labelLimit) { nodes { name } }
      comments(last: $commentLimit) {
        nodes {
          author { login }
          body
          createdAt
          lastEditedAt
        }
      }
      userContentEdits(last: $editLimit) {
        nodes {
          editor { login }
          editedAt
        }
      }
      timelineItems(
        itemTypes: [LABELED_EVENT, RENAMED_TITLE_EVENT, REOPENED_EVENT],
        last: $timelineLimit
      ) {
        nodes {
          __typename
          ... on LabeledEvent {
            createdAt
            actor { login }
            label { name }
          }
          ... on RenamedTitleEvent {
            createdAt
            actor { login }
          }
          ... on ReopenedEvent {
            createdAt
            actor { login }
          }
        }
      }
    }
  }
}
"#;

/// Builds the variables object for [`ISSUE_SNAPSHOT_QUERY`].
pub fn issue_snapshot_variables(
    owner: &str,
    name: &str,
    number: u64,
    windows: &HistoryWindows,
) -> Value {
    serde_json::json!({
        "owner": owner,
        "name": name,
        "number": number,
        "labelLimit": windows.label_limit,
        "commentLimit": windows.comment_limit,
        "editLimit": windows.edit_limit,
        "timelineLimit": windows.timeline_limit,
    })
}

#[derive(Debug, Deserialize)]
struct GraphqlActor {
    #[serde(default)]
    login: Option<String>,
}

fn actor_login(actor: Option<GraphqlActor>) -> String {
    actor.and_then(|actor| actor.login).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct GraphqlConnection<T> {
    #[serde(default)]
    nodes: Option<Vec<Option<T>>>,
}

fn connection_nodes<T>(connection: Option<GraphqlConnection<T>>) -> impl Iterator<Item = T> {
    connection
        .and_then(|connection| connection.nodes)
        .unwrap_or_default()
        .into_iter()
        .flatten()
}

#[derive(Debug, Deserialize)]
struct GraphqlLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlComment {
    #[serde(default)]
    author: Option<GraphqlActor>,
    #[serde(default)]
    body: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    last_edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlContentEdit {
    #[serde(default)]
    editor: Option<GraphqlActor>,
    edited_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum GraphqlTimelineNode {
    LabeledEvent {
        #[serde(rename = "createdAt")]
        created_at: DateTime<Utc>,
        #[serde(default)]
        actor: Option<GraphqlActor>,
        #[serde(default)]
        label: Option<GraphqlLabel>,
    },
    RenamedTitleEvent {
        #[serde(rename = "createdAt")]
        created_at: DateTime<Utc>,
        #[serde(default)]
        actor: Option<GraphqlActor>,
    },
    ReopenedEvent {
        #[serde(rename = "createdAt")]
        created_at: DateTime<Utc>,
        #[serde(default)]
        actor: Option<GraphqlActor>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlIssueNode {
    #[serde(default)]
    author: Option<GraphqlActor>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    labels: Option<GraphqlConnection<GraphqlLabel>>,
    #[serde(default)]
    comments: Option<GraphqlConnection<GraphqlComment>>,
    #[serde(default)]
    user_content_edits: Option<GraphqlConnection<GraphqlContentEdit>>,
    #[serde(default)]
    timeline_items: Option<GraphqlConnection<GraphqlTimelineNode>>,
}

impl GraphqlIssueNode {
    fn into_snapshot(self, number: u64) -> IssueSnapshot {
        let labels = connection_nodes(self.labels)
            .map(|label| label.name)
            .collect();
        let comments = connection_nodes(self.comments)
            .map(|comment| SnapshotComment {
                author: actor_login(comment.author),
                body: comment.body.unwrap_or_default(),
                created_at: comment.created_at,
                last_edited_at: comment.last_edited_at,
            })
            .collect();
        let description_edits = connection_nodes(self.user_content_edits)
            .map(|edit| DescriptionEdit {
                editor: actor_login(edit.editor),
                edited_at: edit.edited_at,
            })
            .collect();
        let timeline_items = connection_nodes(self.timeline_items)
            .filter_map(|node| match node {
                GraphqlTimelineNode::LabeledEvent {
                    created_at,
                    actor,
                    label,
                } => Some(SnapshotTimelineItem::LabelApplied {
                    label: label.map(|label| label.name).unwrap_or_default(),
                    actor: actor_login(actor),
                    created_at,
                }),
                GraphqlTimelineNode::RenamedTitleEvent { created_at, actor } => {
                    Some(SnapshotTimelineItem::TitleRenamed {
                        actor: actor_login(actor),
                        created_at,
                    })
                }
                GraphqlTimelineNode::ReopenedEvent { created_at, actor } => {
                    Some(SnapshotTimelineItem::Reopened {
                        actor: actor_login(actor),
                        created_at,
                    })
                }
                GraphqlTimelineNode::Unsupported => None,
            })
            .collect();

        IssueSnapshot {
            number,
            author: actor_login(self.author),
            created_at: self.created_at,
            labels,
            comments,
            description_edits,
            timeline_items,
        }
    }
}
