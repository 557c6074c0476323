//! Composition root: builds the store, remote client and services once per run

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use launchpad_core::{
    load_config_or_default, resolve_storage_path, AppLocks, Config, ImportOrchestrator,
    JsonFileStore, LaunchpadError, ListingStore, StoreContext, StoreCredentialVault,
    SubmissionCoordinator, VersionReconciler,
};
use launchpad_stores::apple::AppStoreConnect;
use launchpad_stores::TokenIssuer;

/// Everything a command needs, wired from the configuration in the working directory
pub struct Services {
    pub config: Config,
    pub storage_path: PathBuf,
    pub store: Arc<JsonFileStore>,
    pub tokens: Arc<TokenIssuer>,
    pub reconciler: Arc<VersionReconciler>,
}

impl Services {
    pub fn load() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let (config, config_path) = load_config_or_default(&cwd)?;
        let storage_path = resolve_storage_path(&config, config_path.as_deref(), &cwd);
        debug!(
            config = ?config_path,
            storage = %storage_path.display(),
            "wiring services"
        );

        let store = Arc::new(JsonFileStore::open(storage_path.clone()).map_err(LaunchpadError::from)?);
        let remote = Arc::new(AppStoreConnect::new(config.connect_config()).map_err(LaunchpadError::from)?);
        let tokens = Arc::new(
            TokenIssuer::new(config.auth.audience.clone()).with_policy(config.token_policy()),
        );
        let vault = Arc::new(StoreCredentialVault::new(store.clone()));
        // app locks must hold across concurrent launchpad processes
        let lock_dir = storage_path
            .parent()
            .map(|p| p.join("locks"))
            .unwrap_or_else(|| PathBuf::from("locks"));

        let ctx = StoreContext::new(store.clone(), remote, tokens.clone(), vault)
            .with_remote_deadline(config.remote_deadline());
        let reconciler = Arc::new(
            VersionReconciler::new(ctx, Arc::new(AppLocks::with_lock_dir(lock_dir)))
                .with_lock_policy(config.sync.lock_policy),
        );

        Ok(Self {
            config,
            storage_path,
            store,
            tokens,
            reconciler,
        })
    }

    pub fn coordinator(&self) -> SubmissionCoordinator {
        SubmissionCoordinator::new(self.reconciler.clone())
    }

    pub fn importer(&self) -> ImportOrchestrator {
        ImportOrchestrator::new(self.reconciler.clone(), self.config.import_settings())
    }

    /// Local app id from either a local id or a remote app id
    pub async fn resolve_app(&self, tenant_id: &str, app: &str) -> anyhow::Result<Uuid> {
        if let Ok(id) = Uuid::parse_str(app) {
            return Ok(id);
        }
        let found = self
            .store
            .app_by_remote_id(tenant_id, app)
            .await
            .map_err(LaunchpadError::from)?;
        match found {
            Some(app) => Ok(app.id),
            None => Err(LaunchpadError::NotFound(format!(
                "app {} is not imported for tenant {}",
                app, tenant_id
            ))
            .into()),
        }
    }

    /// Explicit version id, or the app's current version
    pub async fn resolve_version(&self, app_id: Uuid, version: Option<Uuid>) -> anyhow::Result<Uuid> {
        if let Some(id) = version {
            return Ok(id);
        }
        let latest = self
            .store
            .latest_version(app_id)
            .await
            .map_err(LaunchpadError::from)?;
        match latest {
            Some(version) => Ok(version.id),
            None => Err(LaunchpadError::NotFound(format!(
                "app {} has no local version; run `launchpad sync pull` first",
                app_id
            ))
            .into()),
        }
    }
}
