use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tau_stale_audit::audit_policy::HistoryWindows;
use tau_stale_audit::github_transport_helpers::truncate_for_error;
use tau_stale_audit::issue_snapshot::{
    issue_snapshot_variables, IssueSnapshot, ISSUE_SNAPSHOT_QUERY,
};

use crate::api_call_counter::ApiCallCounter;
use crate::http_retry::{read_raw_response, send_with_retry, RetryPolicy};
use crate::StaleAuditError;

const SEARCH_PAGE_SIZE: usize = 100;
const SEARCH_CUTOFF_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `RepoRef` used across Tau components.
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self, StaleAuditError> {
        let trimmed = raw.trim();
        let invalid = || StaleAuditError::Config(format!("invalid repo '{raw}', expected owner/repo"));
        let (owner, name) = trimmed.split_once('/').ok_or_else(invalid)?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Request parameters: nothing, query-string pairs, or a JSON body.
pub enum RequestPayload {
    Empty,
    Query(Vec<(String, String)>),
    Json(Value),
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    number: u64,
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphqlErrorMessage>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorMessage {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
/// Authenticated GitHub REST/GraphQL client bound to one repository.
///
/// Every logical call increments the run-wide counter once, regardless of
/// how many attempts the retry driver needs. A scoped clone (see
/// [`GithubApiClient::scoped`]) additionally increments its own counter.
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
    retry: RetryPolicy,
    run_calls: ApiCallCounter,
    scope_calls: Option<ApiCallCounter>,
}

impl GithubApiClient {
    pub fn new(
        api_base: &str,
        token: &str,
        repo: RepoRef,
        request_timeout_ms: u64,
        retry: RetryPolicy,
    ) -> Result<Self, StaleAuditError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("Tau-stale-audit"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        let auth_value = reqwest::header::HeaderValue::from_str(&auth_header).map_err(|error| {
            StaleAuditError::Config(format!("invalid github authorization header: {error}"))
        })?;
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .map_err(|error| {
                StaleAuditError::Config(format!("failed to create github api client: {error}"))
            })?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
            retry,
            run_calls: ApiCallCounter::new(),
            scope_calls: None,
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// Run-wide counter shared by every clone of this client.
    pub fn api_calls(&self) -> &ApiCallCounter {
        &self.run_calls
    }

    /// Returns a clone that also counts into a fresh per-scope counter.
    pub fn scoped(&self) -> (Self, ApiCallCounter) {
        let scope_calls = ApiCallCounter::new();
        let mut scoped = self.clone();
        scoped.scope_calls = Some(scope_calls.clone());
        (scoped, scope_calls)
    }

    fn record_call(&self) {
        self.run_calls.increment();
        if let Some(scope_calls) = &self.scope_calls {
            scope_calls.increment();
        }
    }

    /// Sends one logical request and returns its JSON body.
    ///
    /// `url` is either absolute or a path relative to the API base.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        payload: RequestPayload,
    ) -> Result<Value, StaleAuditError> {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.api_base, url.trim_start_matches('/'))
        };
        let operation = format!("{method} {url}");
        self.send(&operation, method, &url, &payload).await
    }

    async fn request_json<T>(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        payload: &RequestPayload,
    ) -> Result<T, StaleAuditError>
    where
        T: DeserializeOwned,
    {
        let value = self.send(operation, method, url, payload).await?;
        serde_json::from_value(value).map_err(|error| StaleAuditError::Format {
            operation: operation.to_string(),
            message: error.to_string(),
        })
    }

    async fn send(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        payload: &RequestPayload,
    ) -> Result<Value, StaleAuditError> {
        self.record_call();
        let retried = send_with_retry(self.retry, operation, |attempt| {
            let mut request = self
                .http
                .request(method.clone(), url)
                .header("x-tau-retry-attempt", attempt.saturating_sub(1).to_string());
            request = match payload {
                RequestPayload::Empty => request,
                RequestPayload::Query(pairs) => request.query(pairs),
                RequestPayload::Json(body) => request.json(body),
            };
            async move {
                let response = request.send().await?;
                read_raw_response(response).await
            }
        })
        .await?;

        let response = retried.response;
        if !response.is_success() {
            return Err(StaleAuditError::HttpStatus {
                operation: operation.to_string(),
                status: response.status,
                body: truncate_for_error(&response.body, 800),
            });
        }
        if response.status == 204 || response.body.trim().is_empty() {
            return Ok(json!({
                "status": "success",
                "message": "Deletion successful.",
            }));
        }
        serde_json::from_str(&response.body).map_err(|error| StaleAuditError::Format {
            operation: operation.to_string(),
            message: error.to_string(),
        })
    }

    /// Builds `{api_base}/repos/{owner}/{repo}/...` with each segment percent-encoded.
    fn repo_url(&self, segments: &[&str]) -> Result<String, StaleAuditError> {
        let mut url = reqwest::Url::parse(&self.api_base).map_err(|error| {
            StaleAuditError::Config(format!("invalid github api base '{}': {error}", self.api_base))
        })?;
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                StaleAuditError::Config(format!("github api base '{}' cannot carry paths", self.api_base))
            })?;
            path.pop_if_empty()
                .extend(["repos", self.repo.owner.as_str(), self.repo.name.as_str()])
                .extend(segments);
        }
        Ok(url.to_string())
    }

    fn issue_url(&self, issue_number: u64, tail: &[&str]) -> Result<String, StaleAuditError> {
        let number = issue_number.to_string();
        let mut segments = vec!["issues", number.as_str()];
        segments.extend_from_slice(tail);
        self.repo_url(&segments)
    }

    /// Raw collaborator listing filtered to push permission.
    pub async fn list_push_collaborators(&self) -> Result<Value, StaleAuditError> {
        let url = self.repo_url(&["collaborators"])?;
        let payload = RequestPayload::Query(vec![
            ("permission".to_string(), "push".to_string()),
            ("per_page".to_string(), SEARCH_PAGE_SIZE.to_string()),
        ]);
        self.send("list collaborators", Method::GET, &url, &payload)
            .await
    }

    /// Open issues (pull requests excluded) created before `cutoff`.
    ///
    /// Paging stops on a short page; a failed page ends the search and keeps
    /// whatever was collected so far.
    pub async fn search_old_open_issue_numbers(&self, cutoff: DateTime<Utc>) -> Vec<u64> {
        let query = format!(
            "repo:{} is:issue state:open created:<{}",
            self.repo.as_slug(),
            cutoff.format(SEARCH_CUTOFF_FORMAT)
        );
        tracing::info!(query = %query, "searching for stale candidates");
        let url = format!("{}/search/issues", self.api_base);
        let mut numbers = Vec::new();
        let mut page = 1_u32;
        loop {
            let payload = RequestPayload::Query(vec![
                ("q".to_string(), query.clone()),
                ("per_page".to_string(), SEARCH_PAGE_SIZE.to_string()),
                ("page".to_string(), page.to_string()),
            ]);
            let chunk: SearchPage = match self
                .request_json("search issues", Method::GET, &url, &payload)
                .await
            {
                Ok(chunk) => chunk,
                Err(error) => {
                    tracing::error!(page, error = %error, "issue search page failed");
                    break;
                }
            };
            let chunk_len = chunk.items.len();
            numbers.extend(
                chunk
                    .items
                    .into_iter()
                    .filter(|item| item.pull_request.is_none())
                    .map(|item| item.number),
            );
            if chunk_len < SEARCH_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        tracing::info!(count = numbers.len(), "issue search finished");
        numbers
    }

    /// Fetches the bounded history of one issue with a single GraphQL query.
    pub async fn fetch_issue_snapshot(
        &self,
        issue_number: u64,
        windows: &HistoryWindows,
    ) -> Result<IssueSnapshot, StaleAuditError> {
        let payload = RequestPayload::Json(json!({
            "query": ISSUE_SNAPSHOT_QUERY,
            "variables": issue_snapshot_variables(
                &self.repo.owner,
                &self.repo.name,
                issue_number,
                windows,
            ),
        }));
        let url = format!("{}/graphql", self.api_base);
        let envelope: GraphqlEnvelope = self
            .request_json("issue snapshot query", Method::POST, &url, &payload)
            .await?;
        if let Some(first) = envelope.errors.as_ref().and_then(|errors| errors.first()) {
            return Err(StaleAuditError::GraphQl(first.message.clone()));
        }
        let issue = envelope
            .data
            .as_ref()
            .and_then(|data| data.pointer("/repository/issue"))
            .filter(|issue| !issue.is_null())
            .cloned()
            .ok_or(StaleAuditError::NotFound(issue_number))?;
        IssueSnapshot::from_graphql_issue(issue_number, issue).map_err(|error| {
            StaleAuditError::Format {
                operation: "issue snapshot query".to_string(),
                message: error.to_string(),
            }
        })
    }

    pub async fn add_labels(
        &self,
        issue_number: u64,
        labels: &[String],
    ) -> Result<Value, StaleAuditError> {
        let url = self.issue_url(issue_number, &["labels"])?;
        let payload = RequestPayload::Json(json!(labels));
        self.send("add labels", Method::POST, &url, &payload).await
    }

    pub async fn remove_label(
        &self,
        issue_number: u64,
        label: &str,
    ) -> Result<Value, StaleAuditError> {
        let url = self.issue_url(issue_number, &["labels", label])?;
        self.send("remove label", Method::DELETE, &url, &RequestPayload::Empty)
            .await
    }

    pub async fn create_issue_comment(
        &self,
        issue_number: u64,
        body: &str,
    ) -> Result<Value, StaleAuditError> {
        let url = self.issue_url(issue_number, &["comments"])?;
        let payload = RequestPayload::Json(json!({ "body": body }));
        self.send("create issue comment", Method::POST, &url, &payload)
            .await
    }

    pub async fn close_issue(&self, issue_number: u64) -> Result<Value, StaleAuditError> {
        let url = self.issue_url(issue_number, &[])?;
        let payload = RequestPayload::Json(json!({ "state": "closed" }));
        self.send("close issue", Method::PATCH, &url, &payload)
            .await
    }
}
