use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::github_api_client::GithubApiClient;
use crate::StaleAuditError;

#[derive(Debug, Default)]
/// Process-lifetime cache of logins with push access to the repository.
///
/// The lock is held across the first fetch, so concurrent first callers
/// share a single collaborator request.
pub struct MaintainerDirectory {
    cached: Mutex<Option<Arc<Vec<String>>>>,
}

impl MaintainerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list_maintainers(
        &self,
        client: &GithubApiClient,
    ) -> Result<Arc<Vec<String>>, StaleAuditError> {
        let mut cached = self.cached.lock().await;
        if let Some(maintainers) = cached.as_ref() {
            return Ok(Arc::clone(maintainers));
        }

        let listing = client
            .list_push_collaborators()
            .await
            .map_err(|error| StaleAuditError::Authority(error.to_string()))?;
        let maintainers = Arc::new(collaborator_logins(&listing)?);
        tracing::info!(count = maintainers.len(), "maintainer cache initialised");
        *cached = Some(Arc::clone(&maintainers));
        Ok(maintainers)
    }

    pub async fn is_maintainer(
        &self,
        client: &GithubApiClient,
        login: &str,
    ) -> Result<bool, StaleAuditError> {
        let maintainers = self.list_maintainers(client).await?;
        Ok(maintainers.iter().any(|maintainer| maintainer == login))
    }

    pub async fn reset(&self) {
        *self.cached.lock().await = None;
    }
}

fn collaborator_logins(listing: &Value) -> Result<Vec<String>, StaleAuditError> {
    let rows = listing.as_array().ok_or_else(|| {
        StaleAuditError::Authority("collaborator listing is not a JSON array".to_string())
    })?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get("login").and_then(Value::as_str))
        .map(ToOwned::to_owned)
        .collect())
}
