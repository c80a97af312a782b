//! Retry/backoff driver shared by the GitHub client and the LLM decision agent.

use std::{future::Future, time::Duration};

use tau_stale_audit::github_transport_helpers::{
    is_retryable_github_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};
use tokio::time::sleep;

use crate::StaleAuditError;

pub const DEFAULT_RETRY_MAX_ATTEMPTS: usize = 7;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Attempt budget and base backoff interval for transient failures.
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawResponse {
    pub(crate) status: u16,
    pub(crate) body: String,
    pub(crate) retry_after: Option<Duration>,
}

impl RawResponse {
    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransportFailure {
    pub(crate) retryable: bool,
    pub(crate) message: String,
}

impl From<reqwest::Error> for TransportFailure {
    fn from(error: reqwest::Error) -> Self {
        Self {
            retryable: is_retryable_transport_error(&error),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RetriedResponse {
    pub(crate) response: RawResponse,
    pub(crate) attempts: usize,
}

pub(crate) async fn read_raw_response(
    response: reqwest::Response,
) -> Result<RawResponse, TransportFailure> {
    let status = response.status().as_u16();
    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await?;
    Ok(RawResponse {
        status,
        body,
        retry_after,
    })
}

/// Runs `send_attempt` until it yields a non-retryable response or the
/// attempt budget is spent. `send_attempt` receives the 1-based attempt number.
pub(crate) async fn send_with_retry<F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut send_attempt: F,
) -> Result<RetriedResponse, StaleAuditError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<RawResponse, TransportFailure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0_usize;
    loop {
        attempt = attempt.saturating_add(1);
        match send_attempt(attempt).await {
            Ok(response) if is_retryable_github_status(response.status) => {
                if attempt >= max_attempts {
                    return Err(StaleAuditError::Network {
                        operation: operation.to_string(),
                        message: format!(
                            "gave up after {attempt} attempts, last status {}: {}",
                            response.status,
                            truncate_for_error(&response.body, 800)
                        ),
                    });
                }
                let delay = retry_delay(policy.base_delay_ms, attempt, response.retry_after);
                tracing::warn!(
                    operation,
                    attempt,
                    status = response.status,
                    delay_ms = delay.as_millis() as u64,
                    "retrying transient github response"
                );
                sleep(delay).await;
            }
            Ok(response) => {
                return Ok(RetriedResponse {
                    response,
                    attempts: attempt,
                })
            }
            Err(failure) => {
                if failure.retryable && attempt < max_attempts {
                    let delay = retry_delay(policy.base_delay_ms, attempt, None);
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %failure.message,
                        delay_ms = delay.as_millis() as u64,
                        "retrying transport failure"
                    );
                    sleep(delay).await;
                    continue;
                }
                return Err(StaleAuditError::Network {
                    operation: operation.to_string(),
                    message: format!("{} (after {attempt} attempts)", failure.message),
                });
            }
        }
    }
}
