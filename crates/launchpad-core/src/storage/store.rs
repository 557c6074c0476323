//! Table-backed listing stores

use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

use crate::types::{App, Build, Localization, TenantRecord, Version};

use super::file_lock::FileLock;
use super::tables::Tables;
use super::unit_of_work::UnitOfWork;
use super::{ListingStore, StorageError};

/// Where committed tables are kept between runs
pub trait Persistence: Send + Sync {
    /// Load the last committed tables
    fn load(&self) -> Result<Tables, StorageError>;

    /// Durably write `tables`; on error the previous state must remain readable
    fn save(&self, tables: &Tables) -> Result<(), StorageError>;

    /// Exclusive hold on the persisted state across processes, if it is shared
    fn lock(&self) -> Result<Option<FileLock>, StorageError> {
        Ok(None)
    }

    /// Latest committed tables when other writers may have changed them
    fn reload(&self) -> Result<Option<Tables>, StorageError> {
        Ok(None)
    }
}

/// Keeps nothing beyond the process
#[derive(Debug, Clone, Copy, Default)]
pub struct Volatile;

impl Persistence for Volatile {
    fn load(&self) -> Result<Tables, StorageError> {
        Ok(Tables::default())
    }

    fn save(&self, _tables: &Tables) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Whole-state JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file guarding commits, e.g. `state.json.lock`
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }
}

impl Persistence for JsonFile {
    fn load(&self) -> Result<Tables, StorageError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "state file missing, starting empty");
            return Ok(Tables::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, tables: &Tables) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        // write next to the target so the rename stays on one filesystem
        let mut file = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut file, tables)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;

        debug!(path = %self.path.display(), "state file written");
        Ok(())
    }

    fn lock(&self) -> Result<Option<FileLock>, StorageError> {
        Ok(Some(FileLock::acquire(&self.lock_path())?))
    }

    fn reload(&self) -> Result<Option<Tables>, StorageError> {
        Ok(Some(self.load()?))
    }
}

/// [`ListingStore`] over [`Tables`], committing through a [`Persistence`]
pub struct TableStore<P: Persistence> {
    tables: RwLock<Tables>,
    persistence: P,
    commits: AtomicU64,
}

/// Process-local store
pub type MemoryStore = TableStore<Volatile>;

/// Store persisted to a JSON file
pub type JsonFileStore = TableStore<JsonFile>;

impl<P: Persistence> TableStore<P> {
    /// Open a store, loading whatever `persistence` holds
    pub fn with_persistence(persistence: P) -> Result<Self, StorageError> {
        let tables = persistence.load()?;
        Ok(Self {
            tables: RwLock::new(tables),
            persistence,
            commits: AtomicU64::new(0),
        })
    }

    /// Copy of the current tables
    pub fn snapshot(&self) -> Result<Tables, StorageError> {
        Ok(self.read()?.clone())
    }

    /// Number of non-empty units committed since the store was opened
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables.read().map_err(|_| StorageError::Poisoned)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            persistence: Volatile,
            commits: AtomicU64::new(0),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFileStore {
    /// Open (or start) the state file at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::with_persistence(JsonFile::new(path))
    }
}

#[async_trait]
impl<P: Persistence> ListingStore for TableStore<P> {
    async fn tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>, StorageError> {
        Ok(self.read()?.tenants.get(tenant_id).cloned())
    }

    async fn apps(&self, tenant_id: &str) -> Result<Vec<App>, StorageError> {
        let tables = self.read()?;
        let mut apps: Vec<App> = tables
            .apps
            .values()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect();
        apps.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.remote_id.cmp(&b.remote_id)));
        Ok(apps)
    }

    async fn app(&self, tenant_id: &str, app_id: Uuid) -> Result<Option<App>, StorageError> {
        Ok(self
            .read()?
            .apps
            .get(&app_id)
            .filter(|a| a.tenant_id == tenant_id)
            .cloned())
    }

    async fn app_by_remote_id(
        &self,
        tenant_id: &str,
        remote_id: &str,
    ) -> Result<Option<App>, StorageError> {
        Ok(self
            .read()?
            .apps
            .values()
            .find(|a| a.tenant_id == tenant_id && a.remote_id == remote_id)
            .cloned())
    }

    async fn versions(&self, app_id: Uuid) -> Result<Vec<Version>, StorageError> {
        let tables = self.read()?;
        let mut versions: Vec<Version> = tables
            .versions
            .values()
            .filter(|v| v.app_id == app_id)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.created_at);
        Ok(versions)
    }

    async fn version(&self, version_id: Uuid) -> Result<Option<Version>, StorageError> {
        Ok(self.read()?.versions.get(&version_id).cloned())
    }

    async fn localizations(&self, version_id: Uuid) -> Result<Vec<Localization>, StorageError> {
        let tables = self.read()?;
        let mut rows: Vec<Localization> = tables
            .localizations
            .values()
            .filter(|l| l.version_id == version_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.locale.cmp(&b.locale));
        Ok(rows)
    }

    async fn builds(&self, version_id: Uuid) -> Result<Vec<Build>, StorageError> {
        let tables = self.read()?;
        let mut rows: Vec<Build> = tables
            .builds
            .values()
            .filter(|b| b.version_id == version_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.build_number.cmp(&b.build_number))
        });
        Ok(rows)
    }

    async fn fingerprint(&self, app_id: Uuid) -> Result<Option<String>, StorageError> {
        Ok(self.read()?.fingerprints.get(&app_id).cloned())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), StorageError> {
        if unit.is_empty() {
            return Ok(());
        }

        // other processes may have committed since this store loaded
        let _state_lock = self.persistence.lock()?;
        let mut tables = self.tables.write().map_err(|_| StorageError::Poisoned)?;
        if let Some(latest) = self.persistence.reload()? {
            *tables = latest;
        }
        let next = tables.apply(&unit)?;
        self.persistence.save(&next)?;
        *tables = next;
        self.commits.fetch_add(1, Ordering::SeqCst);

        debug!(ops = unit.len(), "committed unit of work");
        Ok(())
    }
}
