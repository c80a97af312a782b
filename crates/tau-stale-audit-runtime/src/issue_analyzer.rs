use chrono::{DateTime, Utc};
use tau_stale_audit::issue_fact_sheet::{build_fact_sheet, IssueAnalysis};

use crate::audit_context::AuditContext;
use crate::StaleAuditError;

#[derive(Clone)]
/// Turns one issue number into an [`IssueAnalysis`]; never fails.
pub struct IssueAnalyzer {
    context: AuditContext,
}

impl IssueAnalyzer {
    pub fn new(context: AuditContext) -> Self {
        Self { context }
    }

    /// Analyzes with `now` captured after the snapshot arrives.
    pub async fn analyze(&self, issue_number: u64) -> IssueAnalysis {
        self.analyze_with_clock(issue_number, Utc::now).await
    }

    /// Analyzes against a fixed `now`.
    pub async fn analyze_at(&self, issue_number: u64, now: DateTime<Utc>) -> IssueAnalysis {
        self.analyze_with_clock(issue_number, || now).await
    }

    async fn analyze_with_clock<F>(&self, issue_number: u64, clock: F) -> IssueAnalysis
    where
        F: FnOnce() -> DateTime<Utc>,
    {
        let maintainers = match self
            .context
            .maintainers
            .list_maintainers(&self.context.client)
            .await
        {
            Ok(maintainers) => maintainers,
            Err(error) => {
                return IssueAnalysis::error(format!("error getting cached maintainers: {error}"))
            }
        };

        let snapshot = match self
            .context
            .client
            .fetch_issue_snapshot(issue_number, &self.context.windows)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(error) => return IssueAnalysis::error(analysis_error_reason(&error)),
        };

        build_fact_sheet(&snapshot, &maintainers, &self.context.policy, clock())
    }
}

fn analysis_error_reason(error: &StaleAuditError) -> String {
    match error {
        StaleAuditError::Network { .. } | StaleAuditError::HttpStatus { .. } => {
            format!("network error: {error}")
        }
        _ => error.to_string(),
    }
}
