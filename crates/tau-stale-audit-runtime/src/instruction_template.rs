use tau_stale_audit::audit_messages::format_threshold_days;
use tau_stale_audit::audit_policy::StaleAuditPolicy;

use crate::github_api_client::RepoRef;
use crate::StaleAuditError;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Values substituted into `{{placeholder}}` slots of the agent instruction.
pub struct InstructionValues {
    pub owner: String,
    pub repo: String,
    pub stale_label_name: String,
    pub request_clarification_label: String,
    pub stale_threshold_days: String,
    pub close_threshold_days: String,
}

impl InstructionValues {
    pub fn from_policy(repo: &RepoRef, policy: &StaleAuditPolicy) -> Self {
        Self {
            owner: repo.owner.clone(),
            repo: repo.name.clone(),
            stale_label_name: policy.stale_label_name.clone(),
            request_clarification_label: policy.request_clarification_label.clone(),
            stale_threshold_days: format_threshold_days(policy.stale_hours_threshold),
            close_threshold_days: format_threshold_days(policy.close_hours_after_stale_threshold),
        }
    }

    fn lookup(&self, placeholder: &str) -> Option<&str> {
        let value = match placeholder {
            "owner" => &self.owner,
            "repo" => &self.repo,
            "stale_label_name" => &self.stale_label_name,
            "request_clarification_label" => &self.request_clarification_label,
            "stale_threshold_days" => &self.stale_threshold_days,
            "close_threshold_days" => &self.close_threshold_days,
            _ => return None,
        };
        Some(value.as_str())
    }
}

pub fn render_instruction_template(
    template: &str,
    values: &InstructionValues,
) -> Result<String, StaleAuditError> {
    let mut rendered = String::with_capacity(template.len());
    let mut cursor = 0usize;

    while let Some(open_offset) = template[cursor..].find("{{") {
        let open_index = cursor + open_offset;
        rendered.push_str(&template[cursor..open_index]);
        let close_offset = template[open_index + 2..].find("}}").ok_or_else(|| {
            StaleAuditError::Config(
                "instruction template contains unterminated placeholder".to_string(),
            )
        })?;
        let close_index = open_index + 2 + close_offset;
        let placeholder = template[open_index + 2..close_index].trim();
        if placeholder.is_empty() {
            return Err(StaleAuditError::Config(
                "instruction template contains empty placeholder".to_string(),
            ));
        }
        let value = values.lookup(placeholder).ok_or_else(|| {
            StaleAuditError::Config(format!(
                "instruction template placeholder '{placeholder}' is not supported"
            ))
        })?;
        rendered.push_str(value);
        cursor = close_index + 2;
    }

    rendered.push_str(&template[cursor..]);
    Ok(rendered)
}
