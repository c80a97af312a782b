use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tau_stale_audit::audit_policy::{HistoryWindows, StaleAuditPolicy};
use tokio::sync::watch;

use crate::audit_context::AuditContext;
use crate::batch_orchestrator::{
    wait_for_cancel, AgentIssueProcessor, BatchOrchestrator, BatchOrchestratorConfig, IssueProcessor, RunMetrics,
};
use crate::decision_agent::DecisionAgent;
use crate::github_api_client::{GithubApiClient, RepoRef};
use crate::http_retry::RetryPolicy;
use crate::StaleAuditError;

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone)]
/// Public struct `StaleAuditRuntimeConfig` used across Tau components.
pub struct StaleAuditRuntimeConfig {
    pub repo_slug: String,
    pub api_base: String,
    pub token: String,
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
    pub policy: StaleAuditPolicy,
    pub windows: HistoryWindows,
    pub concurrency_limit: usize,
    pub chunk_pause: Duration,
    /// Explicit issues to audit; the search step is skipped when non-empty.
    pub issue_numbers: Vec<u64>,
}

/// One full audit pass over a repository.
pub struct StaleAuditRuntime {
    context: AuditContext,
    orchestrator: BatchOrchestrator,
    issue_numbers: Vec<u64>,
}

impl StaleAuditRuntime {
    pub fn new(
        config: StaleAuditRuntimeConfig,
        agent: Arc<dyn DecisionAgent>,
    ) -> Result<Self, StaleAuditError> {
        let repo = RepoRef::parse(&config.repo_slug)?;
        let client = GithubApiClient::new(
            &config.api_base,
            &config.token,
            repo,
            config.request_timeout_ms,
            config.retry,
        )?;
        let context = AuditContext::new(client, config.policy, config.windows);
        let processor: Arc<dyn IssueProcessor> =
            Arc::new(AgentIssueProcessor::new(context.clone(), agent));
        let orchestrator = BatchOrchestrator::new(
            processor,
            BatchOrchestratorConfig {
                concurrency_limit: config.concurrency_limit.max(1),
                chunk_pause: config.chunk_pause,
            },
        );
        Ok(Self {
            context,
            orchestrator,
            issue_numbers: config.issue_numbers,
        })
    }

    pub fn context(&self) -> &AuditContext {
        &self.context
    }

    /// Searches for candidates (unless issues were given explicitly) and
    /// audits them. Cancelling during the search ends the run before any
    /// issue is processed.
    pub async fn run(&self, cancel_rx: watch::Receiver<bool>) -> RunMetrics {
        let run_calls = self.context.client.api_calls();
        run_calls.reset();

        let issue_numbers = if self.issue_numbers.is_empty() {
            let cutoff = stale_search_cutoff(&self.context.policy, Utc::now());
            let mut search_cancel_rx = cancel_rx.clone();
            tokio::select! {
                numbers = self.context.client.search_old_open_issue_numbers(cutoff) => numbers,
                _ = wait_for_cancel(&mut search_cancel_rx) => {
                    tracing::warn!("run cancelled during issue search");
                    return RunMetrics {
                        search_api_calls: run_calls.get(),
                        cancelled: true,
                        ..RunMetrics::default()
                    };
                }
            }
        } else {
            self.issue_numbers.clone()
        };
        let search_api_calls = run_calls.get();

        if issue_numbers.is_empty() {
            tracing::info!("no issues matched the criteria, run finished");
            return RunMetrics {
                search_api_calls,
                ..RunMetrics::default()
            };
        }
        tracing::info!(
            issues = issue_numbers.len(),
            search_api_calls,
            "found issues to process"
        );

        let mut metrics = self.orchestrator.run_all(&issue_numbers, cancel_rx).await;
        metrics.search_api_calls = search_api_calls;
        metrics
    }
}

fn stale_cutoff_age(policy: &StaleAuditPolicy) -> chrono::Duration {
    let millis = (policy.stale_hours_threshold * 3_600_000.0).max(0.0) as i64;
    chrono::Duration::milliseconds(millis)
}

/// Creation cutoff for the candidate search; clamps to the earliest
/// representable instant instead of overflowing.
fn stale_search_cutoff(policy: &StaleAuditPolicy, now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_signed(stale_cutoff_age(policy))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Final summary lines of a run.
pub fn log_run_summary(metrics: &RunMetrics) {
    tracing::info!("stale audit run finished");
    if metrics.cancelled {
        tracing::warn!(
            remaining = metrics.issues_total.saturating_sub(metrics.issues_processed),
            "run was cancelled before all issues were processed"
        );
    }
    tracing::info!(
        failed = metrics.issues_failed,
        "successfully processed {} issues",
        metrics.issues_processed
    );
    tracing::info!(
        search_api_calls = metrics.search_api_calls,
        issue_api_calls = metrics.issue_api_calls,
        "total API calls made this run: {}",
        metrics.total_api_calls()
    );
    tracing::info!(
        "average processing time per issue: {:.2} seconds",
        metrics.average_processing_time().as_secs_f64()
    );
    tracing::info!(
        chunks = metrics.chunks_started,
        pacing_pauses = metrics.pacing_pauses,
        "full audit finished in {:.2} minutes",
        metrics.wall_clock.as_secs_f64() / 60.0
    );
}
