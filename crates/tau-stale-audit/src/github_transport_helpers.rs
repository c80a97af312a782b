use std::time::Duration;

const RETRY_DELAY_CAP_MS: u64 = 60_000;

/// Rate limiting and the transient 5xx family are retried; everything else is final.
pub fn is_retryable_github_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?;
    let seconds = raw.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

/// Exponential backoff for the given 1-based attempt, doubling from
/// `base_delay_ms`. A server-provided `Retry-After` wins when it is longer.
pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16) as u32;
    let scaled = base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent));
    let backoff = Duration::from_millis(scaled.min(RETRY_DELAY_CAP_MS));
    match retry_after {
        Some(delay) => delay.max(backoff),
        None => backoff,
    }
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
