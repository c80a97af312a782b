pub const DEFAULT_STALE_LABEL_NAME: &str = "stale";
pub const DEFAULT_REQUEST_CLARIFICATION_LABEL: &str = "request clarification";
pub const DEFAULT_BOT_LOGIN: &str = "adk-bot";
pub const BOT_ALERT_SIGNATURE: &str =
    "**Notification:** The author has updated the issue description";
pub const DEFAULT_STALE_HOURS_THRESHOLD: f64 = 168.0;
pub const DEFAULT_CLOSE_HOURS_AFTER_STALE_THRESHOLD: f64 = 168.0;

pub const DEFAULT_LABEL_WINDOW: u32 = 20;
pub const DEFAULT_COMMENT_WINDOW: u32 = 30;
pub const DEFAULT_EDIT_WINDOW: u32 = 10;
pub const DEFAULT_TIMELINE_WINDOW: u32 = 20;

const BOT_LOGIN_SUFFIX: &str = "[bot]";

#[derive(Debug, Clone, PartialEq)]
/// Labels, identities and thresholds shared by every stage of an audit.
pub struct StaleAuditPolicy {
    pub stale_label_name: String,
    pub request_clarification_label: String,
    pub bot_login: String,
    pub bot_alert_signature: String,
    pub stale_hours_threshold: f64,
    pub close_hours_after_stale_threshold: f64,
}

impl Default for StaleAuditPolicy {
    fn default() -> Self {
        Self {
            stale_label_name: DEFAULT_STALE_LABEL_NAME.to_string(),
            request_clarification_label: DEFAULT_REQUEST_CLARIFICATION_LABEL.to_string(),
            bot_login: DEFAULT_BOT_LOGIN.to_string(),
            bot_alert_signature: BOT_ALERT_SIGNATURE.to_string(),
            stale_hours_threshold: DEFAULT_STALE_HOURS_THRESHOLD,
            close_hours_after_stale_threshold: DEFAULT_CLOSE_HOURS_AFTER_STALE_THRESHOLD,
        }
    }
}

impl StaleAuditPolicy {
    pub fn stale_threshold_days(&self) -> f64 {
        hours_to_days(self.stale_hours_threshold)
    }

    pub fn close_threshold_days(&self) -> f64 {
        hours_to_days(self.close_hours_after_stale_threshold)
    }

    /// Returns true for actors whose activity never counts as a human signal.
    pub fn is_bot_actor(&self, login: &str) -> bool {
        is_bot_actor(login, &self.bot_login)
    }
}

/// Empty logins (deleted accounts), `[bot]` apps and the auditor itself are bot-like.
pub fn is_bot_actor(login: &str, bot_login: &str) -> bool {
    login.is_empty() || login.ends_with(BOT_LOGIN_SUFFIX) || login == bot_login
}

pub fn hours_to_days(hours: f64) -> f64 {
    hours / 24.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Per-list bounds applied by the issue snapshot query (N most recent items).
pub struct HistoryWindows {
    pub label_limit: u32,
    pub comment_limit: u32,
    pub edit_limit: u32,
    pub timeline_limit: u32,
}

impl Default for HistoryWindows {
    fn default() -> Self {
        Self {
            label_limit: DEFAULT_LABEL_WINDOW,
            comment_limit: DEFAULT_COMMENT_WINDOW,
            edit_limit: DEFAULT_EDIT_WINDOW,
            timeline_limit: DEFAULT_TIMELINE_WINDOW,
        }
    }
}
