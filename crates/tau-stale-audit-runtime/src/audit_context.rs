use std::sync::Arc;

use tau_stale_audit::audit_policy::{HistoryWindows, StaleAuditPolicy};

use crate::api_call_counter::ApiCallCounter;
use crate::github_api_client::GithubApiClient;
use crate::maintainer_directory::MaintainerDirectory;

#[derive(Clone)]
/// Shared handles every analysis and tool call needs.
pub struct AuditContext {
    pub client: GithubApiClient,
    pub maintainers: Arc<MaintainerDirectory>,
    pub policy: Arc<StaleAuditPolicy>,
    pub windows: HistoryWindows,
}

impl AuditContext {
    pub fn new(client: GithubApiClient, policy: StaleAuditPolicy, windows: HistoryWindows) -> Self {
        Self {
            client,
            maintainers: Arc::new(MaintainerDirectory::new()),
            policy: Arc::new(policy),
            windows,
        }
    }

    /// Same context with a client that also counts into a per-issue counter.
    pub fn scoped(&self) -> (Self, ApiCallCounter) {
        let (client, scope_calls) = self.client.scoped();
        let scoped = Self {
            client,
            maintainers: Arc::clone(&self.maintainers),
            policy: Arc::clone(&self.policy),
            windows: self.windows,
        };
        (scoped, scope_calls)
    }
}
