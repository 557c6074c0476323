//! Remote store traits

use crate::apple::BearerToken;
use crate::error::Result;
use crate::types::*;

/// Typed access to a remote store-management API
///
/// Every call takes a valid bearer token. Implementations normalize all
/// remote failures into [`crate::StoreError`] before returning.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Get the store name
    fn name(&self) -> &str;

    /// List all apps visible to the API key
    async fn list_apps(&self, token: &BearerToken) -> Result<Vec<RemoteApp>>;

    /// Latest version state and its localizations for one app
    async fn get_version_status(
        &self,
        token: &BearerToken,
        app_remote_id: &str,
    ) -> Result<VersionSnapshot>;

    /// Create a new version for an app
    async fn create_version(
        &self,
        token: &BearerToken,
        app_remote_id: &str,
        version_string: &str,
        platform: Platform,
    ) -> Result<RemoteVersion>;

    /// Builds uploaded for the version's version string
    async fn list_builds_for_version(
        &self,
        token: &BearerToken,
        version_remote_id: &str,
    ) -> Result<Vec<RemoteBuild>>;

    /// Attach a processed build to a version
    async fn select_build(
        &self,
        token: &BearerToken,
        version_remote_id: &str,
        build_remote_id: &str,
    ) -> Result<RemoteVersion>;

    /// Submit a version for App Review
    async fn submit_for_review(
        &self,
        token: &BearerToken,
        version_remote_id: &str,
        platform: Platform,
    ) -> Result<SubmissionAck>;
}
