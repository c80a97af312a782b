use async_trait::async_trait;
use tau_stale_audit::issue_fact_sheet::IssueAnalysis;

use crate::audit_tools::AuditToolbox;
use crate::StaleAuditError;

const DECISION_PREVIEW_CHARS: usize = 150;

#[derive(Clone)]
/// One issue handed to the decision agent together with its tools.
pub struct AuditRequest {
    pub issue_number: u64,
    pub prompt: String,
    pub analysis: IssueAnalysis,
    pub toolbox: AuditToolbox,
}

impl AuditRequest {
    pub fn new(issue_number: u64, analysis: IssueAnalysis, toolbox: AuditToolbox) -> Self {
        Self {
            issue_number,
            prompt: render_audit_prompt(issue_number, &analysis),
            analysis,
            toolbox,
        }
    }
}

/// User turn for one issue: the audit request plus the current fact sheet.
pub fn render_audit_prompt(issue_number: u64, analysis: &IssueAnalysis) -> String {
    let facts = serde_json::to_string_pretty(&analysis.to_json())
        .unwrap_or_else(|_| analysis.to_json().to_string());
    format!("Audit Issue #{issue_number}.\n\nCurrent issue state:\n```json\n{facts}\n```")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Final text of the agent and the tools it invoked, in order.
pub struct AuditDecision {
    pub summary: String,
    pub tool_calls: Vec<String>,
}

#[async_trait]
pub trait DecisionAgent: Send + Sync {
    async fn decide(&self, request: AuditRequest) -> Result<AuditDecision, StaleAuditError>;
}

/// Single-line, length-bounded rendering of a decision for logs.
pub fn decision_preview(summary: &str) -> String {
    let flattened = summary.replace(['\r', '\n'], " ");
    flattened.chars().take(DECISION_PREVIEW_CHARS).collect()
}
