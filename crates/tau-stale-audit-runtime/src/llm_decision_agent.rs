//! Decision agent backed by an OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tau_stale_audit::github_transport_helpers::truncate_for_error;

use crate::audit_tools::AuditToolDefinition;
use crate::decision_agent::{AuditDecision, AuditRequest, DecisionAgent};
use crate::http_retry::{read_raw_response, send_with_retry, RetryPolicy};
use crate::StaleAuditError;

pub const DEFAULT_LLM_MAX_TURNS: usize = 8;

#[derive(Debug, Clone)]
/// Public struct `LlmDecisionAgentConfig` used across Tau components.
pub struct LlmDecisionAgentConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub instruction: String,
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
    pub max_turns: usize,
}

#[derive(Debug, Clone)]
pub struct LlmDecisionAgent {
    http: reqwest::Client,
    config: LlmDecisionAgentConfig,
}

impl LlmDecisionAgent {
    pub fn new(config: LlmDecisionAgentConfig) -> Result<Self, StaleAuditError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|error| {
                StaleAuditError::Config(format!("failed to create llm client: {error}"))
            })?;
        Ok(Self { http, config })
    }

    fn chat_completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    async fn complete(&self, body: &Value) -> Result<OpenAiChoiceMessage, StaleAuditError> {
        let url = self.chat_completions_url();
        let retried = send_with_retry(self.config.retry, "chat completion", |attempt| {
            let request = self
                .http
                .post(url.as_str())
                .bearer_auth(self.config.api_key.trim())
                .header("x-tau-retry-attempt", attempt.saturating_sub(1).to_string())
                .json(body);
            async move {
                let response = request.send().await?;
                read_raw_response(response).await
            }
        })
        .await
        .map_err(|error| StaleAuditError::Agent(error.to_string()))?;

        let response = retried.response;
        if !response.is_success() {
            return Err(StaleAuditError::Agent(format!(
                "chat completion failed with status {}: {}",
                response.status,
                truncate_for_error(&response.body, 800)
            )));
        }
        let parsed: OpenAiChatResponse = serde_json::from_str(&response.body).map_err(|error| {
            StaleAuditError::Agent(format!("failed to decode chat completion: {error}"))
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| StaleAuditError::Agent("response contained no choices".to_string()))
    }
}

#[async_trait]
impl DecisionAgent for LlmDecisionAgent {
    async fn decide(&self, request: AuditRequest) -> Result<AuditDecision, StaleAuditError> {
        let tools = to_openai_tools(&request.toolbox.definitions());
        let mut messages = vec![
            json!({ "role": "system", "content": self.config.instruction }),
            json!({ "role": "user", "content": request.prompt }),
        ];
        let mut invoked = Vec::new();

        let max_turns = self.config.max_turns.max(1);
        for turn in 1..=max_turns {
            let body = json!({
                "model": self.config.model,
                "messages": messages,
                "tools": tools,
                "tool_choice": "auto",
            });
            let message = self.complete(&body).await?;
            let text = content_text(message.content.as_ref());
            let tool_calls = message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .filter(|call| call.call_type == "function")
                .collect::<Vec<_>>();
            if tool_calls.is_empty() {
                return Ok(AuditDecision {
                    summary: text,
                    tool_calls: invoked,
                });
            }

            tracing::debug!(
                issue_number = request.issue_number,
                turn,
                tool_calls = tool_calls.len(),
                "decision agent requested tools"
            );
            let assistant_content = if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            };
            messages.push(json!({
                "role": "assistant",
                "content": assistant_content,
                "tool_calls": tool_calls,
            }));
            for call in tool_calls {
                let arguments = parse_tool_call_arguments(&call.function.arguments);
                let result = request.toolbox.execute(&call.function.name, arguments).await;
                invoked.push(call.function.name.clone());
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": result.to_string(),
                }));
            }
        }

        Err(StaleAuditError::Agent(format!(
            "issue #{} exceeded {} decision turns",
            request.issue_number, max_turns
        )))
    }
}

fn to_openai_tools(tools: &[AuditToolDefinition]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect(),
    )
}

fn content_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

fn parse_tool_call_arguments(arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(value) => value,
        Err(_) => Value::String(arguments.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<Value>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "default_tool_call_type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn default_tool_call_type() -> String {
    "function".to_string()
}
