//! The six audit tools the decision agent may invoke.
//!
//! Mutating tools never fail outward: remote errors become
//! `{"status": "failure", "message": ...}` payloads.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tau_stale_audit::audit_messages::{
    render_close_comment, render_maintainer_alert, render_stale_comment,
};

use crate::audit_context::AuditContext;
use crate::issue_analyzer::IssueAnalyzer;

pub const ADD_LABEL_TOOL: &str = "add_label_to_issue";
pub const REMOVE_LABEL_TOOL: &str = "remove_label_from_issue";
pub const ADD_STALE_LABEL_AND_COMMENT_TOOL: &str = "add_stale_label_and_comment";
pub const ALERT_MAINTAINER_OF_EDIT_TOOL: &str = "alert_maintainer_of_edit";
pub const CLOSE_AS_STALE_TOOL: &str = "close_as_stale";
pub const GET_ISSUE_STATE_TOOL: &str = "get_issue_state";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Public struct `AuditToolDefinition` used across Tau components.
pub struct AuditToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ToolStatus` values.
pub enum ToolStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Result payload of a mutating audit tool.
pub struct ToolOutcome {
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolOutcome {
    pub fn success() -> Self {
        Self {
            status: ToolStatus::Success,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Failure,
            message: Some(message.into()),
        }
    }

    pub fn to_json(&self) -> Value {
        match &self.message {
            Some(message) => json!({ "status": self.status, "message": message }),
            None => json!({ "status": self.status }),
        }
    }
}

#[async_trait]
pub trait AuditTool: Send + Sync {
    fn definition(&self) -> AuditToolDefinition;
    async fn execute(&self, arguments: Value) -> Value;
}

#[derive(Debug, Deserialize)]
struct IssueTargetArgs {
    issue_number: u64,
}

#[derive(Debug, Deserialize)]
struct LabelTargetArgs {
    issue_number: u64,
    label_name: String,
}

fn parse_arguments<T>(tool: &str, arguments: Value) -> Result<T, ToolOutcome>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(arguments)
        .map_err(|error| ToolOutcome::failure(format!("invalid arguments for {tool}: {error}")))
}

fn issue_target_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "issue_number": {
                "type": "integer",
                "description": "The GitHub issue number"
            }
        },
        "required": ["issue_number"],
        "additionalProperties": false
    })
}

fn label_target_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "issue_number": {
                "type": "integer",
                "description": "The GitHub issue number"
            },
            "label_name": {
                "type": "string",
                "description": "The specific name of the label"
            }
        },
        "required": ["issue_number", "label_name"],
        "additionalProperties": false
    })
}

fn definition(name: &str, description: &str, parameters: Value) -> AuditToolDefinition {
    AuditToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

pub struct AddLabelTool {
    context: AuditContext,
}

#[async_trait]
impl AuditTool for AddLabelTool {
    fn definition(&self) -> AuditToolDefinition {
        definition(
            ADD_LABEL_TOOL,
            "Adds a specific label to a GitHub issue.",
            label_target_schema(),
        )
    }

    async fn execute(&self, arguments: Value) -> Value {
        let args: LabelTargetArgs = match parse_arguments(ADD_LABEL_TOOL, arguments) {
            Ok(args) => args,
            Err(outcome) => return outcome.to_json(),
        };
        let outcome = match self
            .context
            .client
            .add_labels(args.issue_number, &[args.label_name])
            .await
        {
            Ok(_) => ToolOutcome::success(),
            Err(error) => ToolOutcome::failure(error.to_string()),
        };
        outcome.to_json()
    }
}

pub struct RemoveLabelTool {
    context: AuditContext,
}

#[async_trait]
impl AuditTool for RemoveLabelTool {
    fn definition(&self) -> AuditToolDefinition {
        definition(
            REMOVE_LABEL_TOOL,
            "Remove a specific label from a GitHub issue.",
            label_target_schema(),
        )
    }

    async fn execute(&self, arguments: Value) -> Value {
        let args: LabelTargetArgs = match parse_arguments(REMOVE_LABEL_TOOL, arguments) {
            Ok(args) => args,
            Err(outcome) => return outcome.to_json(),
        };
        let outcome = match self
            .context
            .client
            .remove_label(args.issue_number, &args.label_name)
            .await
        {
            Ok(_) => ToolOutcome::success(),
            Err(error) => ToolOutcome::failure(format!("error removing label: {error}")),
        };
        outcome.to_json()
    }
}

pub struct AddStaleLabelAndCommentTool {
    context: AuditContext,
}

#[async_trait]
impl AuditTool for AddStaleLabelAndCommentTool {
    fn definition(&self) -> AuditToolDefinition {
        definition(
            ADD_STALE_LABEL_AND_COMMENT_TOOL,
            "Marks the issue as stale with a comment and label.",
            issue_target_schema(),
        )
    }

    async fn execute(&self, arguments: Value) -> Value {
        let args: IssueTargetArgs =
            match parse_arguments(ADD_STALE_LABEL_AND_COMMENT_TOOL, arguments) {
                Ok(args) => args,
                Err(outcome) => return outcome.to_json(),
            };
        let client = &self.context.client;
        let policy = &self.context.policy;

        // Comment first; the label only follows a posted explanation.
        if let Err(error) = client
            .create_issue_comment(args.issue_number, &render_stale_comment(policy))
            .await
        {
            return ToolOutcome::failure(format!("error posting stale comment: {error}")).to_json();
        }
        if let Err(error) = client
            .add_labels(args.issue_number, &[policy.stale_label_name.clone()])
            .await
        {
            return ToolOutcome::failure(format!("error adding stale label: {error}")).to_json();
        }
        ToolOutcome::success().to_json()
    }
}

pub struct AlertMaintainerOfEditTool {
    context: AuditContext,
}

#[async_trait]
impl AuditTool for AlertMaintainerOfEditTool {
    fn definition(&self) -> AuditToolDefinition {
        definition(
            ALERT_MAINTAINER_OF_EDIT_TOOL,
            "Post a comment alerting maintainers of a silent edit.",
            issue_target_schema(),
        )
    }

    async fn execute(&self, arguments: Value) -> Value {
        let args: IssueTargetArgs = match parse_arguments(ALERT_MAINTAINER_OF_EDIT_TOOL, arguments)
        {
            Ok(args) => args,
            Err(outcome) => return outcome.to_json(),
        };
        let body = render_maintainer_alert(&self.context.policy);
        let outcome = match self
            .context
            .client
            .create_issue_comment(args.issue_number, &body)
            .await
        {
            Ok(_) => ToolOutcome::success(),
            Err(error) => ToolOutcome::failure(format!("error posting alert: {error}")),
        };
        outcome.to_json()
    }
}

pub struct CloseAsStaleTool {
    context: AuditContext,
}

#[async_trait]
impl AuditTool for CloseAsStaleTool {
    fn definition(&self) -> AuditToolDefinition {
        definition(
            CLOSE_AS_STALE_TOOL,
            "Close the issue as completed/stale.",
            issue_target_schema(),
        )
    }

    async fn execute(&self, arguments: Value) -> Value {
        let args: IssueTargetArgs = match parse_arguments(CLOSE_AS_STALE_TOOL, arguments) {
            Ok(args) => args,
            Err(outcome) => return outcome.to_json(),
        };
        let client = &self.context.client;
        if let Err(error) = client
            .create_issue_comment(args.issue_number, &render_close_comment(&self.context.policy))
            .await
        {
            return ToolOutcome::failure(format!("error posting close comment: {error}")).to_json();
        }
        if let Err(error) = client.close_issue(args.issue_number).await {
            return ToolOutcome::failure(format!("error closing issue: {error}")).to_json();
        }
        ToolOutcome::success().to_json()
    }
}

pub struct GetIssueStateTool {
    analyzer: IssueAnalyzer,
}

#[async_trait]
impl AuditTool for GetIssueStateTool {
    fn definition(&self) -> AuditToolDefinition {
        definition(
            GET_ISSUE_STATE_TOOL,
            "Fetch and analyze the current state/history of the issue.",
            issue_target_schema(),
        )
    }

    async fn execute(&self, arguments: Value) -> Value {
        match serde_json::from_value::<IssueTargetArgs>(arguments) {
            Ok(args) => self.analyzer.analyze(args.issue_number).await.to_json(),
            Err(error) => json!({
                "status": "error",
                "error": format!("invalid arguments for {GET_ISSUE_STATE_TOOL}: {error}"),
            }),
        }
    }
}

#[derive(Clone)]
/// Registry of the audit tools bound to one (usually per-issue scoped) context.
pub struct AuditToolbox {
    tools: Vec<Arc<dyn AuditTool>>,
}

impl AuditToolbox {
    pub fn new(context: AuditContext) -> Self {
        let tools: Vec<Arc<dyn AuditTool>> = vec![
            Arc::new(AddLabelTool {
                context: context.clone(),
            }),
            Arc::new(RemoveLabelTool {
                context: context.clone(),
            }),
            Arc::new(AddStaleLabelAndCommentTool {
                context: context.clone(),
            }),
            Arc::new(AlertMaintainerOfEditTool {
                context: context.clone(),
            }),
            Arc::new(CloseAsStaleTool {
                context: context.clone(),
            }),
            Arc::new(GetIssueStateTool {
                analyzer: IssueAnalyzer::new(context),
            }),
        ];
        Self { tools }
    }

    pub fn definitions(&self) -> Vec<AuditToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    pub async fn execute(&self, name: &str, arguments: Value) -> Value {
        let Some(tool) = self
            .tools
            .iter()
            .find(|tool| tool.definition().name == name)
        else {
            tracing::warn!(tool = name, "decision agent requested unknown tool");
            return ToolOutcome::failure(format!("unknown tool '{name}'")).to_json();
        };
        tracing::debug!(tool = name, arguments = %arguments, "executing audit tool");
        tool.execute(arguments).await
    }
}
