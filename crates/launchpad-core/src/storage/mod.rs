//! Local listing storage
//!
//! Reads go through [`ListingStore`]; every write goes through
//! [`ListingStore::commit`] with a [`UnitOfWork`], which lands whole or not
//! at all.

mod file_lock;
mod store;
mod tables;
mod unit_of_work;

pub use file_lock::FileLock;
pub use store::{JsonFile, JsonFileStore, MemoryStore, Persistence, TableStore, Volatile};
pub use tables::Tables;
pub use unit_of_work::{UnitOfWork, WriteOp};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{App, Build, Localization, TenantRecord, Version};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write would break a table constraint
    #[error("Storage constraint violated: {0}")]
    Constraint(String),

    /// IO error
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// State file could not be encoded or decoded
    #[error("State file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A writer panicked while holding the tables
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Persisted tenants, apps, versions, localizations and builds
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Tenant by id
    async fn tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>, StorageError>;

    /// All apps imported for a tenant
    async fn apps(&self, tenant_id: &str) -> Result<Vec<App>, StorageError>;

    /// App by local id, scoped to the tenant
    async fn app(&self, tenant_id: &str, app_id: Uuid) -> Result<Option<App>, StorageError>;

    async fn app_by_remote_id(
        &self,
        tenant_id: &str,
        remote_id: &str,
    ) -> Result<Option<App>, StorageError>;

    /// Versions of an app, oldest first
    async fn versions(&self, app_id: Uuid) -> Result<Vec<Version>, StorageError>;

    async fn version(&self, version_id: Uuid) -> Result<Option<Version>, StorageError>;

    /// The app's current version: the one created last
    async fn latest_version(&self, app_id: Uuid) -> Result<Option<Version>, StorageError> {
        Ok(self
            .versions(app_id)
            .await?
            .into_iter()
            .max_by_key(|v| v.created_at))
    }

    /// Localizations of a version, ordered by locale
    async fn localizations(&self, version_id: Uuid) -> Result<Vec<Localization>, StorageError>;

    /// Builds recorded for a version
    async fn builds(&self, version_id: Uuid) -> Result<Vec<Build>, StorageError>;

    /// Remote fingerprint last written for an app
    async fn fingerprint(&self, app_id: Uuid) -> Result<Option<String>, StorageError>;

    /// Apply a unit of work atomically
    async fn commit(&self, unit: UnitOfWork) -> Result<(), StorageError>;
}
