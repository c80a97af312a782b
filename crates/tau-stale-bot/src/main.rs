mod bootstrap_helpers;
mod cli_args;
mod stale_bot_config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tau_stale_audit_runtime::llm_decision_agent::LlmDecisionAgent;
use tau_stale_audit_runtime::stale_audit_runtime::{log_run_summary, StaleAuditRuntime};
use tokio::sync::watch;

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;
use crate::stale_bot_config::{
    build_agent_config, build_runtime_config, load_instruction_template, render_instruction,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_stale_bot(cli).await
}

async fn run_stale_bot(cli: Cli) -> Result<()> {
    let runtime_config = build_runtime_config(&cli)?;
    let template = load_instruction_template(cli.instruction_template.as_deref())?;
    let instruction = render_instruction(&cli, &template)?;
    tracing::info!("instruction template loaded");
    tracing::info!(
        repo = %runtime_config.repo_slug,
        stale_hours = runtime_config.policy.stale_hours_threshold,
        close_hours = runtime_config.policy.close_hours_after_stale_threshold,
        concurrency_limit = runtime_config.concurrency_limit,
        explicit_issues = runtime_config.issue_numbers.len(),
        "starting stale bot"
    );

    let agent = LlmDecisionAgent::new(build_agent_config(&cli, instruction)?)?;
    let runtime = StaleAuditRuntime::new(runtime_config, Arc::new(agent))?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let run_timeout = cli.run_timeout_seconds.map(Duration::from_secs);
    tokio::spawn(async move {
        wait_for_shutdown_signal(run_timeout).await;
        let _ = cancel_tx.send(true);
    });

    let metrics = runtime.run(cancel_rx).await;
    log_run_summary(&metrics);
    Ok(())
}

async fn wait_for_shutdown_signal(run_timeout: Option<Duration>) {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    match run_timeout {
        Some(timeout) => {
            tokio::select! {
                _ = ctrl_c => tracing::warn!("interrupt received, cancelling run"),
                _ = tokio::time::sleep(timeout) => {
                    tracing::warn!(timeout_seconds = timeout.as_secs(), "run timeout reached, cancelling run");
                }
            }
        }
        None => {
            ctrl_c.await;
            tracing::warn!("interrupt received, cancelling run");
        }
    }
}
