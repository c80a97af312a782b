use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tau_stale_audit::audit_policy::{HistoryWindows, StaleAuditPolicy, BOT_ALERT_SIGNATURE};
use tau_stale_audit_runtime::github_api_client::RepoRef;
use tau_stale_audit_runtime::http_retry::RetryPolicy;
use tau_stale_audit_runtime::instruction_template::{
    render_instruction_template, InstructionValues,
};
use tau_stale_audit_runtime::llm_decision_agent::LlmDecisionAgentConfig;
use tau_stale_audit_runtime::stale_audit_runtime::StaleAuditRuntimeConfig;

use crate::cli_args::Cli;

const BUNDLED_INSTRUCTION_TEMPLATE: &str = include_str!("../prompts/stale_audit_instruction.md");

pub(crate) fn repo_slug(cli: &Cli) -> String {
    format!("{}/{}", cli.owner.trim(), cli.repo.trim())
}

pub(crate) fn build_policy(cli: &Cli) -> StaleAuditPolicy {
    StaleAuditPolicy {
        stale_label_name: cli.stale_label_name.clone(),
        request_clarification_label: cli.request_clarification_label.clone(),
        bot_login: cli.bot_login.clone(),
        bot_alert_signature: BOT_ALERT_SIGNATURE.to_string(),
        stale_hours_threshold: cli.stale_hours_threshold,
        close_hours_after_stale_threshold: cli.close_hours_after_stale_threshold,
    }
}

pub(crate) fn build_windows(cli: &Cli) -> HistoryWindows {
    HistoryWindows {
        label_limit: cli.graphql_label_limit,
        comment_limit: cli.graphql_comment_limit,
        edit_limit: cli.graphql_edit_limit,
        timeline_limit: cli.graphql_timeline_limit,
    }
}

fn build_retry(cli: &Cli) -> RetryPolicy {
    RetryPolicy {
        max_attempts: cli.github_retry_max_attempts,
        base_delay_ms: cli.github_retry_base_delay_ms,
    }
}

pub(crate) fn build_runtime_config(cli: &Cli) -> Result<StaleAuditRuntimeConfig> {
    let token = cli.github_token.trim();
    if token.is_empty() {
        return Err(anyhow!("GITHUB_TOKEN environment variable not set"));
    }
    let chunk_pause = Duration::try_from_secs_f64(cli.sleep_between_chunks).map_err(|error| {
        anyhow!(
            "invalid SLEEP_BETWEEN_CHUNKS {}: {error}",
            cli.sleep_between_chunks
        )
    })?;
    Ok(StaleAuditRuntimeConfig {
        repo_slug: repo_slug(cli),
        api_base: cli.github_api_base.clone(),
        token: token.to_string(),
        request_timeout_ms: cli.github_request_timeout_ms,
        retry: build_retry(cli),
        policy: build_policy(cli),
        windows: build_windows(cli),
        concurrency_limit: cli.concurrency_limit,
        chunk_pause,
        issue_numbers: cli.issue_numbers.clone(),
    })
}

/// Reads the instruction template, falling back to the bundled one when no
/// path is configured. A configured but unreadable path is fatal.
pub(crate) fn load_instruction_template(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(BUNDLED_INSTRUCTION_TEMPLATE.to_string());
    };
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read instruction template {}", path.display()))
}

pub(crate) fn render_instruction(cli: &Cli, template: &str) -> Result<String> {
    let repo = RepoRef::parse(&repo_slug(cli))?;
    let values = InstructionValues::from_policy(&repo, &build_policy(cli));
    render_instruction_template(template, &values).context("failed to render instruction template")
}

pub(crate) fn build_agent_config(cli: &Cli, instruction: String) -> Result<LlmDecisionAgentConfig> {
    let api_key = cli
        .llm_api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| anyhow!("OPENAI_API_KEY (or --llm-api-key) is required for the decision agent"))?;
    Ok(LlmDecisionAgentConfig {
        api_base: cli.llm_api_base.clone(),
        api_key: api_key.to_string(),
        model: cli.llm_model.clone(),
        instruction,
        request_timeout_ms: cli.github_request_timeout_ms,
        retry: build_retry(cli),
        max_turns: cli.llm_max_turns,
    })
}
