//! Chunked, bounded-parallel processing of candidate issues.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::FutureExt;
use tau_stale_audit::issue_fact_sheet::IssueAnalysis;
use tokio::sync::watch;
use tokio::task::JoinError;

use crate::audit_context::AuditContext;
use crate::audit_tools::AuditToolbox;
use crate::decision_agent::{decision_preview, AuditDecision, AuditRequest, DecisionAgent};
use crate::issue_analyzer::IssueAnalyzer;

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 3;
pub const DEFAULT_CHUNK_PAUSE_MS: u64 = 1_500;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `IssueRunOutcome` values.
pub enum IssueRunOutcome {
    Decided(AuditDecision),
    AnalysisFailed(String),
    AgentFailed(String),
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `IssueRunReport` used across Tau components.
pub struct IssueRunReport {
    pub issue_number: u64,
    pub elapsed: Duration,
    pub api_calls: u64,
    pub outcome: IssueRunOutcome,
}

impl IssueRunReport {
    pub fn is_failure(&self) -> bool {
        !matches!(self.outcome, IssueRunOutcome::Decided(_))
    }
}

#[async_trait]
pub trait IssueProcessor: Send + Sync {
    async fn process(&self, issue_number: u64) -> IssueRunReport;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOrchestratorConfig {
    pub concurrency_limit: usize,
    pub chunk_pause: Duration,
}

impl Default for BatchOrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            chunk_pause: Duration::from_millis(DEFAULT_CHUNK_PAUSE_MS),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Additive counters for one audit run.
pub struct RunMetrics {
    pub issues_total: usize,
    pub issues_processed: usize,
    pub issues_failed: usize,
    pub search_api_calls: u64,
    pub issue_api_calls: u64,
    pub total_processing_time: Duration,
    pub wall_clock: Duration,
    pub chunks_started: usize,
    pub chunk_sizes: Vec<usize>,
    pub pacing_pauses: usize,
    pub cancelled: bool,
    pub reports: Vec<IssueRunReport>,
}

impl RunMetrics {
    pub fn total_api_calls(&self) -> u64 {
        self.search_api_calls.saturating_add(self.issue_api_calls)
    }

    pub fn average_processing_time(&self) -> Duration {
        if self.issues_processed == 0 {
            return Duration::ZERO;
        }
        let divisor = u32::try_from(self.issues_processed).unwrap_or(u32::MAX);
        self.total_processing_time / divisor
    }

    fn record(&mut self, report: IssueRunReport) {
        self.issues_processed = self.issues_processed.saturating_add(1);
        self.issue_api_calls = self.issue_api_calls.saturating_add(report.api_calls);
        self.total_processing_time += report.elapsed;
        if report.is_failure() {
            self.issues_failed = self.issues_failed.saturating_add(1);
        }
        self.reports.push(report);
    }
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    processor: Arc<dyn IssueProcessor>,
    config: BatchOrchestratorConfig,
}

impl BatchOrchestrator {
    pub fn new(processor: Arc<dyn IssueProcessor>, config: BatchOrchestratorConfig) -> Self {
        Self { processor, config }
    }

    /// Processes `issue_numbers` in sequential chunks of `concurrency_limit`
    /// concurrent tasks, pausing between chunks.
    ///
    /// Setting the cancel flag drops in-flight tasks, skips remaining chunks
    /// and cuts a pacing pause short. Only finished issues are reported.
    pub async fn run_all(
        &self,
        issue_numbers: &[u64],
        mut cancel_rx: watch::Receiver<bool>,
    ) -> RunMetrics {
        let started = Instant::now();
        let limit = self.config.concurrency_limit.max(1);
        let chunk_count = issue_numbers.len().div_ceil(limit);
        let mut metrics = RunMetrics {
            issues_total: issue_numbers.len(),
            ..RunMetrics::default()
        };

        for (chunk_index, chunk) in issue_numbers.chunks(limit).enumerate() {
            if *cancel_rx.borrow() {
                metrics.cancelled = true;
                break;
            }
            let chunk_number = chunk_index + 1;
            metrics.chunks_started += 1;
            metrics.chunk_sizes.push(chunk.len());
            tracing::info!(chunk = chunk_number, issues = ?chunk, "starting chunk");

            let handles = chunk
                .iter()
                .map(|&issue_number| {
                    let processor = Arc::clone(&self.processor);
                    let mut task_cancel_rx = cancel_rx.clone();
                    let handle = tokio::spawn(async move {
                        tokio::select! {
                            report = processor.process(issue_number) => Some(report),
                            _ = wait_for_cancel(&mut task_cancel_rx) => None,
                        }
                    });
                    (issue_number, handle)
                })
                .collect::<Vec<_>>();

            for (issue_number, handle) in handles {
                match handle.await {
                    Ok(Some(report)) => metrics.record(report),
                    Ok(None) => {
                        tracing::warn!(issue_number, "issue processing cancelled");
                        metrics.cancelled = true;
                    }
                    Err(error) => {
                        let reason = join_error_reason(error);
                        tracing::error!(issue_number, reason = %reason, "issue task panicked");
                        metrics.record(IssueRunReport {
                            issue_number,
                            elapsed: Duration::ZERO,
                            api_calls: 0,
                            outcome: IssueRunOutcome::Panicked(reason),
                        });
                    }
                }
            }

            tracing::info!(
                chunk = chunk_number,
                "finished chunk, progress: {}/{}",
                metrics.issues_processed,
                metrics.issues_total
            );
            if metrics.cancelled {
                break;
            }
            if chunk_number < chunk_count {
                metrics.pacing_pauses += 1;
                tokio::select! {
                    _ = tokio::time::sleep(self.config.chunk_pause) => {}
                    _ = wait_for_cancel(&mut cancel_rx) => {
                        metrics.cancelled = true;
                        break;
                    }
                }
            }
        }

        metrics.wall_clock = started.elapsed();
        metrics
    }
}

/// Resolves once the flag reads `true`; never resolves if the sender is gone.
pub(crate) async fn wait_for_cancel(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow_and_update() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn join_error_reason(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    panic_reason(error.into_panic())
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

/// Default per-issue pipeline: analyze, then let the decision agent act.
pub struct AgentIssueProcessor {
    context: AuditContext,
    agent: Arc<dyn DecisionAgent>,
}

impl AgentIssueProcessor {
    pub fn new(context: AuditContext, agent: Arc<dyn DecisionAgent>) -> Self {
        Self { context, agent }
    }
}

impl AgentIssueProcessor {
    async fn audit_issue(&self, issue_number: u64, scoped: AuditContext) -> IssueRunOutcome {
        let analysis = IssueAnalyzer::new(scoped.clone()).analyze(issue_number).await;
        match analysis {
            IssueAnalysis::Error { error } => {
                tracing::warn!(issue_number, error = %error, "issue analysis failed");
                IssueRunOutcome::AnalysisFailed(error)
            }
            analysis @ IssueAnalysis::Success(_) => {
                let request = AuditRequest::new(issue_number, analysis, AuditToolbox::new(scoped));
                match self.agent.decide(request).await {
                    Ok(decision) => {
                        tracing::info!(
                            issue_number,
                            "#{issue_number} Decision: {}...",
                            decision_preview(&decision.summary)
                        );
                        IssueRunOutcome::Decided(decision)
                    }
                    Err(error) => {
                        tracing::error!(issue_number, error = %error, "decision agent failed");
                        IssueRunOutcome::AgentFailed(error.to_string())
                    }
                }
            }
        }
    }
}

#[async_trait]
impl IssueProcessor for AgentIssueProcessor {
    async fn process(&self, issue_number: u64) -> IssueRunReport {
        let started = Instant::now();
        tracing::info!(issue_number, "processing issue");
        let (scoped, scope_calls) = self.context.scoped();

        // A panic here still reports the calls and time spent before it.
        let outcome = match AssertUnwindSafe(self.audit_issue(issue_number, scoped))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = panic_reason(payload);
                tracing::error!(issue_number, reason = %reason, "issue processing panicked");
                IssueRunOutcome::Panicked(reason)
            }
        };

        let report = IssueRunReport {
            issue_number,
            elapsed: started.elapsed(),
            api_calls: scope_calls.get(),
            outcome,
        };
        tracing::info!(
            issue_number,
            api_calls = report.api_calls,
            "issue #{issue_number} finished in {:.2}s with ~{} API calls",
            report.elapsed.as_secs_f64(),
            report.api_calls
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use httpmock::prelude::*;
    use serde_json::json;
    use tau_stale_audit::audit_policy::{HistoryWindows, StaleAuditPolicy};
    use tokio::sync::{watch, Mutex};

    use super::{
        AgentIssueProcessor, BatchOrchestrator, BatchOrchestratorConfig, IssueProcessor,
        IssueRunOutcome, IssueRunReport, RunMetrics,
    };
    use crate::audit_context::AuditContext;
    use crate::decision_agent::{AuditDecision, AuditRequest, DecisionAgent};
    use crate::github_api_client::{GithubApiClient, RepoRef};
    use crate::http_retry::RetryPolicy;
    use crate::StaleAuditError;

    #[derive(Default)]
    struct RecordingProcessor {
        seen: Mutex<Vec<u64>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        panic_on: Option<u64>,
        hang_on: Option<u64>,
    }

    #[async_trait]
    impl IssueProcessor for RecordingProcessor {
        async fn process(&self, issue_number: u64) -> IssueRunReport {
            let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
            if self.panic_on == Some(issue_number) {
                panic!("simulated failure for #{issue_number}");
            }
            if self.hang_on == Some(issue_number) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.seen.lock().await.push(issue_number);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            IssueRunReport {
                issue_number,
                elapsed: Duration::from_millis(10),
                api_calls: 2,
                outcome: IssueRunOutcome::Decided(AuditDecision::default()),
            }
        }
    }

    fn fast_config(concurrency_limit: usize) -> BatchOrchestratorConfig {
        BatchOrchestratorConfig {
            concurrency_limit,
            chunk_pause: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn functional_run_all_splits_seven_issues_into_three_chunks() {
        let processor = Arc::new(RecordingProcessor::default());
        let orchestrator = BatchOrchestrator::new(processor.clone(), fast_config(3));
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let metrics = orchestrator
            .run_all(&[1, 2, 3, 4, 5, 6, 7], cancel_rx)
            .await;

        assert_eq!(metrics.chunk_sizes, vec![3, 3, 1]);
        assert_eq!(metrics.chunks_started, 3);
        assert_eq!(metrics.pacing_pauses, 2);
        assert_eq!(metrics.issues_processed, 7);
        assert_eq!(metrics.issues_failed, 0);
        assert_eq!(metrics.issue_api_calls, 14);
        assert_eq!(metrics.total_processing_time, Duration::from_millis(70));
        assert_eq!(metrics.average_processing_time(), Duration::from_millis(10));
        assert!(!metrics.cancelled);
        assert!(processor.max_in_flight.load(Ordering::SeqCst) <= 3);
        let mut seen = processor.seen.lock().await.clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn regression_panicking_issue_does_not_abort_siblings() {
        let processor = Arc::new(RecordingProcessor {
            panic_on: Some(2),
            ..RecordingProcessor::default()
        });
        let orchestrator = BatchOrchestrator::new(processor.clone(), fast_config(2));
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let metrics = orchestrator.run_all(&[1, 2, 3, 4], cancel_rx).await;

        assert_eq!(metrics.issues_processed, 4);
        assert_eq!(metrics.issues_failed, 1);
        let panicked = metrics
            .reports
            .iter()
            .find(|report| report.issue_number == 2)
            .expect("report for #2");
        assert_eq!(panicked.api_calls, 0);
        assert!(matches!(
            &panicked.outcome,
            IssueRunOutcome::Panicked(reason) if reason.contains("simulated failure for #2")
        ));
        assert_eq!(processor.seen.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn integration_cancellation_drops_in_flight_work_and_skips_chunks() {
        let processor = Arc::new(RecordingProcessor {
            hang_on: Some(2),
            ..RecordingProcessor::default()
        });
        let orchestrator = BatchOrchestrator::new(processor.clone(), fast_config(2));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = cancel_tx.send(true);
        });

        let started = Instant::now();
        let metrics = orchestrator.run_all(&[1, 2, 3, 4, 5], cancel_rx).await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(metrics.cancelled);
        assert_eq!(metrics.chunks_started, 1);
        assert_eq!(metrics.issues_processed, 1);
        assert_eq!(metrics.reports[0].issue_number, 1);
        assert_eq!(metrics.pacing_pauses, 0);
    }

    #[tokio::test]
    async fn unit_run_all_with_preset_cancel_starts_nothing() {
        let processor = Arc::new(RecordingProcessor::default());
        let orchestrator = BatchOrchestrator::new(processor.clone(), fast_config(3));
        let (_cancel_tx, cancel_rx) = watch::channel(true);
        let metrics = orchestrator.run_all(&[1, 2], cancel_rx).await;
        assert!(metrics.cancelled);
        assert_eq!(metrics.chunks_started, 0);
        assert!(processor.seen.lock().await.is_empty());
    }

    struct PanickingAgent;

    #[async_trait]
    impl DecisionAgent for PanickingAgent {
        async fn decide(&self, request: AuditRequest) -> Result<AuditDecision, StaleAuditError> {
            panic!("agent crashed on #{}", request.issue_number);
        }
    }

    #[tokio::test]
    async fn regression_agent_panic_keeps_calls_made_before_it() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/widgets/collaborators");
            then.status(200).json_body(json!([{ "login": "maya" }]));
        });
        server.mock(|when, then| {
            when.method(POST).path("/graphql");
            then.status(200).json_body(json!({
                "data": { "repository": { "issue": {
                    "author": { "login": "alice" },
                    "createdAt": "2026-01-01T00:00:00Z",
                    "labels": { "nodes": [] },
                    "comments": { "nodes": [] },
                    "userContentEdits": { "nodes": [] },
                    "timelineItems": { "nodes": [] }
                } } }
            }));
        });
        let client = GithubApiClient::new(
            &server.base_url(),
            "test-token",
            RepoRef::parse("acme/widgets").expect("repo"),
            5_000,
            RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 1,
            },
        )
        .expect("client");
        let context = AuditContext::new(
            client,
            StaleAuditPolicy::default(),
            HistoryWindows::default(),
        );
        let processor = Arc::new(AgentIssueProcessor::new(
            context.clone(),
            Arc::new(PanickingAgent),
        ));
        let orchestrator = BatchOrchestrator::new(processor, fast_config(2));
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let metrics = orchestrator.run_all(&[21], cancel_rx).await;

        assert_eq!(metrics.issues_processed, 1);
        assert_eq!(metrics.issues_failed, 1);
        assert_eq!(metrics.issue_api_calls, 2);
        assert_eq!(metrics.total_api_calls(), context.client.api_calls().get());
        let report = &metrics.reports[0];
        assert!(report.elapsed > Duration::ZERO);
        assert!(matches!(
            &report.outcome,
            IssueRunOutcome::Panicked(reason) if reason.contains("agent crashed on #21")
        ));
    }

    #[test]
    fn unit_run_metrics_totals_and_empty_average() {
        let metrics = RunMetrics {
            search_api_calls: 3,
            issue_api_calls: 9,
            ..RunMetrics::default()
        };
        assert_eq!(metrics.total_api_calls(), 12);
        assert_eq!(metrics.average_processing_time(), Duration::ZERO);
    }
}
