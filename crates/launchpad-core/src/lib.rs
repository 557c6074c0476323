//! Launchpad Core - listing synchronization and release submission
//!
//! This crate keeps a local copy of each tenant's store listings in step with
//! the remote store and drives a release from version creation to review
//! submission. Remote access goes through [`launchpad_stores::RemoteStore`];
//! local state goes through [`storage::ListingStore`].

pub mod config;
pub mod context;
pub mod error;
pub mod locks;
pub mod storage;
pub mod sync;
pub mod types;
pub mod vault;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{load_config, load_config_or_default, resolve_storage_path, Config};
pub use context::StoreContext;
pub use error::{ConfigError, ErrorKind, LaunchpadError, Result};
pub use locks::{AppLockGuard, AppLocks, LockPolicy};
pub use storage::{JsonFileStore, ListingStore, MemoryStore, StorageError, UnitOfWork, WriteOp};
pub use sync::VersionReconciler;
pub use types::{
    App, Build, Localization, ReconciliationResult, StalenessReport, SubmissionOutcome,
    TenantRecord, Version, VersionDescriptor,
};
pub use vault::{configure_store_connection, CredentialVault, StoreConnection, StoreCredentialVault};
pub use workflow::{ImportOrchestrator, ImportOutcome, ImportReport, ImportSettings, SubmissionCoordinator};

pub use launchpad_stores::{Platform, StoreCredential, VersionState};
