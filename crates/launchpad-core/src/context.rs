//! Shared collaborators for the listing services

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use launchpad_stores::{BearerToken, RemoteStore, StoreError, TokenIssuer};

use crate::error::{LaunchpadError, Result};
use crate::storage::ListingStore;
use crate::types::{App, Version};
use crate::vault::CredentialVault;

/// Default deadline for a single remote call
pub const DEFAULT_REMOTE_DEADLINE: Duration = Duration::from_secs(60);

/// Storage, remote client, tokens and credentials, wired once by the caller
#[derive(Clone)]
pub struct StoreContext {
    pub store: Arc<dyn ListingStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub tokens: Arc<TokenIssuer>,
    pub vault: Arc<dyn CredentialVault>,
    pub remote_deadline: Duration,
}

impl StoreContext {
    pub fn new(
        store: Arc<dyn ListingStore>,
        remote: Arc<dyn RemoteStore>,
        tokens: Arc<TokenIssuer>,
        vault: Arc<dyn CredentialVault>,
    ) -> Self {
        Self {
            store,
            remote,
            tokens,
            vault,
            remote_deadline: DEFAULT_REMOTE_DEADLINE,
        }
    }

    pub fn with_remote_deadline(mut self, deadline: Duration) -> Self {
        self.remote_deadline = deadline;
        self
    }

    /// Bearer token for the tenant, from cache when still fresh
    pub async fn token(&self, tenant_id: &str) -> Result<BearerToken> {
        let credential = self.vault.credential(tenant_id).await?;
        Ok(self.tokens.token(tenant_id, &credential)?)
    }

    /// Run one remote call under the remote deadline
    ///
    /// An `Auth` failure drops the tenant's cached token so the next call
    /// signs a fresh one.
    pub async fn remote_call<T, F>(&self, tenant_id: &str, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        debug!(tenant = tenant_id, operation, "remote call");
        match tokio::time::timeout(self.remote_deadline, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                if matches!(err, StoreError::Auth(_)) {
                    self.tokens.invalidate(tenant_id);
                }
                Err(err.into())
            }
            Err(_) => {
                warn!(
                    tenant = tenant_id,
                    operation,
                    deadline_secs = self.remote_deadline.as_secs(),
                    "remote call timed out"
                );
                Err(LaunchpadError::Timeout(format!(
                    "{} did not finish within {}s",
                    operation,
                    self.remote_deadline.as_secs()
                )))
            }
        }
    }

    /// Local app, scoped to the tenant
    pub async fn app(&self, tenant_id: &str, app_id: Uuid) -> Result<App> {
        self.store
            .app(tenant_id, app_id)
            .await?
            .ok_or_else(|| LaunchpadError::NotFound(format!("app {}", app_id)))
    }

    /// Local version that belongs to `app`
    pub async fn version_of(&self, app: &App, version_id: Uuid) -> Result<Version> {
        self.store
            .version(version_id)
            .await?
            .filter(|v| v.app_id == app.id)
            .ok_or_else(|| {
                LaunchpadError::NotFound(format!("version {} of app {}", version_id, app.id))
            })
    }
}
