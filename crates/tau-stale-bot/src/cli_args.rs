use std::path::PathBuf;

use clap::{ArgAction, Parser};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(value: &str) -> Result<u32, String> {
    let parsed = value
        .parse::<u32>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

/// One hundred years.
const MAX_THRESHOLD_HOURS: f64 = 876_000.0;
const MAX_CHUNK_PAUSE_SECONDS: f64 = 3_600.0;

fn parse_threshold_hours(value: &str) -> Result<f64, String> {
    let parsed = value
        .parse::<f64>()
        .map_err(|error| format!("failed to parse float: {error}"))?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err("value must be a finite number greater than 0".to_string());
    }
    if parsed > MAX_THRESHOLD_HOURS {
        return Err(format!("value must be at most {MAX_THRESHOLD_HOURS} hours"));
    }
    Ok(parsed)
}

fn parse_chunk_pause_seconds(value: &str) -> Result<f64, String> {
    let parsed = value
        .parse::<f64>()
        .map_err(|error| format!("failed to parse float: {error}"))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err("value must be a finite number of at least 0".to_string());
    }
    if parsed > MAX_CHUNK_PAUSE_SECONDS {
        return Err(format!("value must be at most {MAX_CHUNK_PAUSE_SECONDS} seconds"));
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "tau-stale-bot",
    about = "Audit open GitHub issues for staleness and let a decision agent act on them",
    version
)]
/// Public struct `Cli` used across Tau components.
pub(crate) struct Cli {
    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token used for every API call"
    )]
    pub(crate) github_token: String,

    #[arg(long = "owner", env = "OWNER", help = "Owner of the audited repository")]
    pub(crate) owner: String,

    #[arg(long = "repo", env = "REPO", help = "Name of the audited repository")]
    pub(crate) repo: String,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_BASE",
        default_value = "https://api.github.com",
        help = "GitHub API base URL"
    )]
    pub(crate) github_api_base: String,

    #[arg(
        long = "stale-hours-threshold",
        env = "STALE_HOURS_THRESHOLD",
        default_value_t = 168.0,
        value_parser = parse_threshold_hours,
        help = "Hours of inactivity after a maintainer question before an issue is marked stale"
    )]
    pub(crate) stale_hours_threshold: f64,

    #[arg(
        long = "close-hours-after-stale-threshold",
        env = "CLOSE_HOURS_AFTER_STALE_THRESHOLD",
        default_value_t = 168.0,
        value_parser = parse_threshold_hours,
        help = "Hours a stale issue stays open before it is closed"
    )]
    pub(crate) close_hours_after_stale_threshold: f64,

    #[arg(
        long = "concurrency-limit",
        env = "CONCURRENCY_LIMIT",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Issues processed concurrently per chunk"
    )]
    pub(crate) concurrency_limit: usize,

    #[arg(
        long = "sleep-between-chunks",
        env = "SLEEP_BETWEEN_CHUNKS",
        default_value_t = 1.5,
        value_parser = parse_chunk_pause_seconds,
        help = "Seconds to pause between chunks"
    )]
    pub(crate) sleep_between_chunks: f64,

    #[arg(
        long = "graphql-label-limit",
        env = "GRAPHQL_LABEL_LIMIT",
        default_value_t = 20,
        value_parser = parse_positive_u32,
        help = "Labels fetched per issue"
    )]
    pub(crate) graphql_label_limit: u32,

    #[arg(
        long = "graphql-comment-limit",
        env = "GRAPHQL_COMMENT_LIMIT",
        default_value_t = 30,
        value_parser = parse_positive_u32,
        help = "Most recent comments fetched per issue"
    )]
    pub(crate) graphql_comment_limit: u32,

    #[arg(
        long = "graphql-edit-limit",
        env = "GRAPHQL_EDIT_LIMIT",
        default_value_t = 10,
        value_parser = parse_positive_u32,
        help = "Most recent description edits fetched per issue"
    )]
    pub(crate) graphql_edit_limit: u32,

    #[arg(
        long = "graphql-timeline-limit",
        env = "GRAPHQL_TIMELINE_LIMIT",
        default_value_t = 20,
        value_parser = parse_positive_u32,
        help = "Most recent label/rename/reopen events fetched per issue"
    )]
    pub(crate) graphql_timeline_limit: u32,

    #[arg(
        long = "stale-label-name",
        env = "STALE_LABEL_NAME",
        default_value = "stale",
        help = "Label that marks an issue as stale"
    )]
    pub(crate) stale_label_name: String,

    #[arg(
        long = "request-clarification-label",
        env = "REQUEST_CLARIFICATION_LABEL",
        default_value = "request clarification",
        help = "Label maintainers use when waiting on the author"
    )]
    pub(crate) request_clarification_label: String,

    #[arg(
        long = "bot-login",
        env = "BOT_LOGIN",
        default_value = "adk-bot",
        help = "Login of the account the bot posts as; its activity is ignored"
    )]
    pub(crate) bot_login: String,

    #[arg(
        long = "github-request-timeout-ms",
        env = "TAU_GITHUB_REQUEST_TIMEOUT_MS",
        default_value_t = 60_000,
        value_parser = parse_positive_u64,
        help = "HTTP timeout for a single GitHub request"
    )]
    pub(crate) github_request_timeout_ms: u64,

    #[arg(
        long = "github-retry-max-attempts",
        env = "TAU_GITHUB_RETRY_MAX_ATTEMPTS",
        default_value_t = 7,
        value_parser = parse_positive_usize,
        help = "Attempts per request (first try included) before giving up"
    )]
    pub(crate) github_retry_max_attempts: usize,

    #[arg(
        long = "github-retry-base-delay-ms",
        env = "TAU_GITHUB_RETRY_BASE_DELAY_MS",
        default_value_t = 1_000,
        value_parser = parse_positive_u64,
        help = "Initial backoff delay, doubled on every retry"
    )]
    pub(crate) github_retry_base_delay_ms: u64,

    #[arg(
        long = "instruction-template",
        env = "STALE_BOT_INSTRUCTION_TEMPLATE",
        help = "Decision agent instruction template; the bundled template is used when omitted"
    )]
    pub(crate) instruction_template: Option<PathBuf>,

    #[arg(
        long = "llm-api-base",
        env = "TAU_LLM_API_BASE",
        default_value = "https://api.openai.com/v1",
        help = "OpenAI-compatible API base used by the decision agent"
    )]
    pub(crate) llm_api_base: String,

    #[arg(
        long = "llm-api-key",
        env = "OPENAI_API_KEY",
        hide_env_values = true,
        help = "API key for the decision agent endpoint"
    )]
    pub(crate) llm_api_key: Option<String>,

    #[arg(
        long = "llm-model",
        env = "TAU_LLM_MODEL",
        default_value = "gpt-4o-mini",
        help = "Model used by the decision agent"
    )]
    pub(crate) llm_model: String,

    #[arg(
        long = "llm-max-turns",
        env = "TAU_LLM_MAX_TURNS",
        default_value_t = 8,
        value_parser = parse_positive_usize,
        help = "Maximum model round-trips per issue"
    )]
    pub(crate) llm_max_turns: usize,

    #[arg(
        long = "run-timeout-seconds",
        env = "STALE_BOT_RUN_TIMEOUT_SECONDS",
        value_parser = parse_positive_u64,
        help = "Cancel the run after this many seconds"
    )]
    pub(crate) run_timeout_seconds: Option<u64>,

    #[arg(
        long = "issue-number",
        action = ArgAction::Append,
        value_delimiter = ',',
        value_parser = parse_positive_u64,
        help = "Audit only these issues instead of searching (repeatable or comma-separated)"
    )]
    pub(crate) issue_numbers: Vec<u64>,
}
