use crate::audit_policy::{hours_to_days, StaleAuditPolicy};

/// Renders an hour threshold as days: whole numbers without decimals ("7"),
/// anything else with one decimal place ("0.5").
pub fn format_threshold_days(hours: f64) -> String {
    let days = hours_to_days(hours);
    if days.fract() == 0.0 {
        format!("{}", days as i64)
    } else {
        format!("{days:.1}")
    }
}

pub fn render_stale_comment(policy: &StaleAuditPolicy) -> String {
    format!(
        "This issue has been automatically marked as stale because it has not had recent \
         activity for {} days after a maintainer requested clarification. It will be closed \
         if no further activity occurs within {} days.",
        format_threshold_days(policy.stale_hours_threshold),
        format_threshold_days(policy.close_hours_after_stale_threshold),
    )
}

pub fn render_close_comment(policy: &StaleAuditPolicy) -> String {
    format!(
        "This has been automatically closed because it has been marked as stale for over {} days.",
        format_threshold_days(policy.close_hours_after_stale_threshold),
    )
}

/// The alert body always starts with the signature so later runs can detect it.
pub fn render_maintainer_alert(policy: &StaleAuditPolicy) -> String {
    format!(
        "{}. Maintainers, please review.",
        policy.bot_alert_signature
    )
}
