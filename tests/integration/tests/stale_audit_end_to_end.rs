use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use httpmock::prelude::*;
use serde_json::{json, Value};
use tau_stale_audit::audit_policy::{HistoryWindows, StaleAuditPolicy, BOT_ALERT_SIGNATURE};
use tau_stale_audit::issue_replay::ActivityRole;
use tau_stale_audit_runtime::audit_tools::{
    ADD_STALE_LABEL_AND_COMMENT_TOOL, ALERT_MAINTAINER_OF_EDIT_TOOL, CLOSE_AS_STALE_TOOL,
};
use tau_stale_audit_runtime::batch_orchestrator::IssueRunOutcome;
use tau_stale_audit_runtime::decision_agent::{AuditDecision, AuditRequest, DecisionAgent};
use tau_stale_audit_runtime::http_retry::RetryPolicy;
use tau_stale_audit_runtime::stale_audit_runtime::{StaleAuditRuntime, StaleAuditRuntimeConfig};
use tau_stale_audit_runtime::StaleAuditError;
use tokio::sync::{watch, Mutex as AsyncMutex};

/// Applies the audit rules directly to the fact sheet instead of asking a model.
struct RuleFollowingAgent {
    requests: AsyncMutex<Vec<u64>>,
}

impl RuleFollowingAgent {
    fn new() -> Self {
        Self {
            requests: AsyncMutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DecisionAgent for RuleFollowingAgent {
    async fn decide(&self, request: AuditRequest) -> Result<AuditDecision, StaleAuditError> {
        self.requests.lock().await.push(request.issue_number);
        let Some(facts) = request.analysis.fact_sheet() else {
            return Ok(AuditDecision {
                summary: "no facts available".to_string(),
                tool_calls: Vec::new(),
            });
        };

        let tool = if facts.maintainer_alert_needed {
            Some(ALERT_MAINTAINER_OF_EDIT_TOOL)
        } else if facts.is_stale && facts.days_since_stale_label > facts.close_threshold_days {
            Some(CLOSE_AS_STALE_TOOL)
        } else if !facts.is_stale
            && facts.last_action_role == ActivityRole::Maintainer
            && facts.days_since_activity > facts.stale_threshold_days
        {
            Some(ADD_STALE_LABEL_AND_COMMENT_TOOL)
        } else {
            None
        };

        let Some(tool) = tool else {
            return Ok(AuditDecision {
                summary: "no action".to_string(),
                tool_calls: Vec::new(),
            });
        };
        let result = request
            .toolbox
            .execute(tool, json!({ "issue_number": request.issue_number }))
            .await;
        if result["status"] != "success" {
            return Err(StaleAuditError::Agent(format!("{tool} failed: {result}")));
        }
        Ok(AuditDecision {
            summary: format!("ran {tool}\nfor #{}", request.issue_number),
            tool_calls: vec![tool.to_string()],
        })
    }
}

fn days_ago(days: i64) -> String {
    (Utc::now() - chrono::Duration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn issue_node(labels: &[&str], comments: Value, edits: Value, timeline: Value) -> Value {
    json!({
        "data": { "repository": { "issue": {
            "author": { "login": "alice" },
            "createdAt": days_ago(40),
            "labels": { "nodes": labels.iter().map(|name| json!({ "name": name })).collect::<Vec<_>>() },
            "comments": { "nodes": comments },
            "userContentEdits": { "nodes": edits },
            "timelineItems": { "nodes": timeline }
        } } }
    })
}

fn runtime_config(server: &MockServer, issue_numbers: Vec<u64>) -> StaleAuditRuntimeConfig {
    StaleAuditRuntimeConfig {
        repo_slug: "acme/widgets".to_string(),
        api_base: server.base_url(),
        token: "test-token".to_string(),
        request_timeout_ms: 5_000,
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
        },
        policy: StaleAuditPolicy::default(),
        windows: HistoryWindows::default(),
        concurrency_limit: 2,
        chunk_pause: Duration::from_millis(1),
        issue_numbers,
    }
}

#[tokio::test]
async fn integration_full_audit_run_marks_closes_alerts_and_isolates_failures() {
    let server = MockServer::start();

    let search = server.mock(|when, then| {
        when.method(GET)
            .path("/search/issues")
            .query_param("per_page", "100")
            .query_param("page", "1");
        then.status(200).json_body(json!({
            "items": [
                { "number": 10 },
                { "number": 11 },
                { "number": 12 },
                { "number": 13 },
                { "number": 14, "pull_request": { "url": "https://example.invalid/pull/14" } }
            ]
        }));
    });
    let collaborators = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/acme/widgets/collaborators")
            .query_param("permission", "push");
        then.status(200)
            .json_body(json!([{ "login": "maya" }, { "login": "adk-bot" }]));
    });

    // #10: maintainer asked for details ten days ago, author silent.
    server.mock(|when, then| {
        when.method(POST).path("/graphql").body_includes("\"number\":10,");
        then.status(200).json_body(issue_node(
            &["request clarification"],
            json!([{
                "author": { "login": "maya" },
                "body": "Can you share a reproduction?",
                "createdAt": days_ago(10),
                "lastEditedAt": null
            }]),
            json!([]),
            json!([]),
        ));
    });
    // #11: stale for nine days with no reply.
    server.mock(|when, then| {
        when.method(POST).path("/graphql").body_includes("\"number\":11,");
        then.status(200).json_body(issue_node(
            &["stale"],
            json!([{
                "author": { "login": "maya" },
                "body": "Any update?",
                "createdAt": days_ago(20),
                "lastEditedAt": null
            }]),
            json!([]),
            json!([{
                "__typename": "LabeledEvent",
                "createdAt": days_ago(9),
                "actor": { "login": "adk-bot" },
                "label": { "name": "stale" }
            }]),
        ));
    });
    // #12: author silently edited the description after an older alert.
    server.mock(|when, then| {
        when.method(POST).path("/graphql").body_includes("\"number\":12,");
        then.status(200).json_body(issue_node(
            &[],
            json!([
                {
                    "author": { "login": "maya" },
                    "body": "Please add logs.",
                    "createdAt": days_ago(6),
                    "lastEditedAt": null
                },
                {
                    "author": { "login": "adk-bot" },
                    "body": format!("{BOT_ALERT_SIGNATURE}. Maintainers, please review."),
                    "createdAt": days_ago(5),
                    "lastEditedAt": null
                }
            ]),
            json!([{ "editor": { "login": "alice" }, "editedAt": days_ago(2) }]),
            json!([]),
        ));
    });
    // #13: deleted between search and analysis.
    server.mock(|when, then| {
        when.method(POST).path("/graphql").body_includes("\"number\":13,");
        then.status(200)
            .json_body(json!({ "data": { "repository": { "issue": null } } }));
    });

    let stale_comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/acme/widgets/issues/10/comments")
            .body_includes("automatically marked as stale");
        then.status(201).json_body(json!({ "id": 100 }));
    });
    let stale_label = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/acme/widgets/issues/10/labels")
            .json_body(json!(["stale"]));
        then.status(200).json_body(json!([{ "name": "stale" }]));
    });
    let close_comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/acme/widgets/issues/11/comments")
            .body_includes("automatically closed");
        then.status(201).json_body(json!({ "id": 110 }));
    });
    let close = server.mock(|when, then| {
        when.method(PATCH)
            .path("/repos/acme/widgets/issues/11")
            .json_body(json!({ "state": "closed" }));
        then.status(200).json_body(json!({ "state": "closed" }));
    });
    let alert = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/acme/widgets/issues/12/comments")
            .body_includes("Maintainers, please review.");
        then.status(201).json_body(json!({ "id": 120 }));
    });

    let agent = Arc::new(RuleFollowingAgent::new());
    let runtime =
        StaleAuditRuntime::new(runtime_config(&server, Vec::new()), agent.clone()).expect("runtime");
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let metrics = runtime.run(cancel_rx).await;

    search.assert_calls(1);
    collaborators.assert_calls(1);
    stale_comment.assert_calls(1);
    stale_label.assert_calls(1);
    close_comment.assert_calls(1);
    close.assert_calls(1);
    alert.assert_calls(1);

    assert!(!metrics.cancelled);
    assert_eq!(metrics.issues_total, 4);
    assert_eq!(metrics.issues_processed, 4);
    assert_eq!(metrics.issues_failed, 1);
    assert_eq!(metrics.chunk_sizes, vec![2, 2]);
    assert_eq!(metrics.pacing_pauses, 1);
    assert_eq!(metrics.search_api_calls, 1);
    // collaborators + 4 snapshots + 2 (#10) + 2 (#11) + 1 (#12)
    assert_eq!(metrics.issue_api_calls, 10);
    assert_eq!(metrics.total_api_calls(), 11);

    let missing = metrics
        .reports
        .iter()
        .find(|report| report.issue_number == 13)
        .expect("report for #13");
    assert_eq!(
        missing.outcome,
        IssueRunOutcome::AnalysisFailed("Issue #13 not found.".to_string())
    );
    let mut decided = agent.requests.lock().await.clone();
    decided.sort_unstable();
    assert_eq!(decided, vec![10, 11, 12]);
}

#[tokio::test]
async fn integration_preset_cancellation_audits_nothing() {
    let server = MockServer::start();
    let collaborators = server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/collaborators");
        then.status(200).json_body(json!([]));
    });
    let agent = Arc::new(RuleFollowingAgent::new());
    let runtime =
        StaleAuditRuntime::new(runtime_config(&server, vec![1, 2, 3]), agent.clone())
            .expect("runtime");
    let (_cancel_tx, cancel_rx) = watch::channel(true);

    let metrics = runtime.run(cancel_rx).await;

    assert!(metrics.cancelled);
    assert_eq!(metrics.issues_total, 3);
    assert_eq!(metrics.issues_processed, 0);
    assert_eq!(metrics.total_api_calls(), 0);
    collaborators.assert_calls(0);
    assert!(agent.requests.lock().await.is_empty());
}
