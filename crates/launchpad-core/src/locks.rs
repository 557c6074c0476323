//! Per-app reconciliation locks

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::error::{LaunchpadError, Result};
use crate::storage::{FileLock, StorageError};

/// Behaviour when the app's lock is already held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockPolicy {
    /// Queue behind the running reconciliation
    #[default]
    Wait,
    /// Fail fast with a retryable `Busy` error
    Reject,
}

type LockKey = (String, Uuid);

/// Mutex per (tenant, app)
///
/// Always held in-process. With a lock directory, a lock file per app is
/// taken as well so separate processes sharing one state file exclude each
/// other.
#[derive(Debug, Default)]
pub struct AppLocks {
    slots: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
    lock_dir: Option<PathBuf>,
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct AppLockGuard {
    _file: Option<FileLock>,
    _guard: OwnedMutexGuard<()>,
}

impl AppLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks that also exclude other processes using `dir`
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            slots: Mutex::default(),
            lock_dir: Some(dir.into()),
        }
    }

    /// Take the lock for `(tenant_id, app_id)` according to `policy`
    pub async fn acquire(
        &self,
        tenant_id: &str,
        app_id: Uuid,
        policy: LockPolicy,
    ) -> Result<AppLockGuard> {
        let slot = self.slot(tenant_id, app_id);
        let guard = match policy {
            LockPolicy::Wait => slot.lock_owned().await,
            LockPolicy::Reject => slot.try_lock_owned().map_err(|_| {
                debug!(tenant = tenant_id, %app_id, "reconciliation lock busy");
                LaunchpadError::Busy { app_id }
            })?,
        };
        let file = match &self.lock_dir {
            Some(dir) => Some(file_lock(dir, tenant_id, app_id, policy).await?),
            None => None,
        };
        Ok(AppLockGuard {
            _file: file,
            _guard: guard,
        })
    }

    /// Number of keys currently tracked
    pub fn tracked(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn slot(&self, tenant_id: &str, app_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // drop slots nobody holds or waits on
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        slots
            .entry((tenant_id.to_string(), app_id))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

async fn file_lock(dir: &Path, tenant_id: &str, app_id: Uuid, policy: LockPolicy) -> Result<FileLock> {
    let tenant: String = tenant_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let path = dir.join(format!("{}-{}.lock", tenant, app_id));

    match policy {
        LockPolicy::Reject => FileLock::try_acquire(&path)
            .map_err(StorageError::from)?
            .ok_or_else(|| {
                debug!(tenant = tenant_id, %app_id, "app locked by another process");
                LaunchpadError::Busy { app_id }
            }),
        LockPolicy::Wait => {
            let lock = tokio::task::spawn_blocking(move || FileLock::acquire(&path))
                .await
                .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
            Ok(lock.map_err(StorageError::from)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_reject_policy_reports_busy() {
        let locks = AppLocks::new();
        let app_id = Uuid::new_v4();

        let held = locks.acquire("acme", app_id, LockPolicy::Reject).await.unwrap();
        let err = locks
            .acquire("acme", app_id, LockPolicy::Reject)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.is_retryable());

        drop(held);
        assert!(locks.acquire("acme", app_id, LockPolicy::Reject).await.is_ok());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let locks = AppLocks::new();
        let app_id = Uuid::new_v4();

        let _first = locks.acquire("acme", app_id, LockPolicy::Reject).await.unwrap();
        assert!(locks.acquire("other", app_id, LockPolicy::Reject).await.is_ok());
        assert!(locks
            .acquire("acme", Uuid::new_v4(), LockPolicy::Reject)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_wait_policy_queues() {
        let locks = Arc::new(AppLocks::new());
        let app_id = Uuid::new_v4();
        let held = locks.acquire("acme", app_id, LockPolicy::Wait).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("acme", app_id, LockPolicy::Wait).await.is_ok() })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(held);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_dir_excludes_other_instances() {
        let temp = tempfile::TempDir::new().unwrap();
        let ours = AppLocks::with_lock_dir(temp.path());
        let theirs = AppLocks::with_lock_dir(temp.path());
        let app_id = Uuid::new_v4();

        let held = ours.acquire("acme/eu", app_id, LockPolicy::Reject).await.unwrap();
        let err = theirs
            .acquire("acme/eu", app_id, LockPolicy::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchpadError::Busy { .. }));
        assert!(theirs.acquire("acme/eu", Uuid::new_v4(), LockPolicy::Reject).await.is_ok());

        drop(held);
        assert!(theirs.acquire("acme/eu", app_id, LockPolicy::Reject).await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_dir_wait_blocks_until_release() {
        let temp = tempfile::TempDir::new().unwrap();
        let ours = AppLocks::with_lock_dir(temp.path());
        let theirs = Arc::new(AppLocks::with_lock_dir(temp.path()));
        let app_id = Uuid::new_v4();

        let held = ours.acquire("acme", app_id, LockPolicy::Wait).await.unwrap();
        let waiter = {
            let theirs = theirs.clone();
            tokio::spawn(async move { theirs.acquire("acme", app_id, LockPolicy::Wait).await.is_ok() })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_released_slots_are_pruned() {
        let locks = AppLocks::new();
        for _ in 0..5 {
            let _guard = locks
                .acquire("acme", Uuid::new_v4(), LockPolicy::Wait)
                .await
                .unwrap();
        }
        let _guard = locks.acquire("acme", Uuid::new_v4(), LockPolicy::Wait).await.unwrap();
        assert_eq!(locks.tracked(), 1);
    }
}
