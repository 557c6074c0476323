//! Version reconciliation

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use launchpad_stores::{RemoteBuild, RemoteVersion, Transition, VersionSnapshot};

use crate::context::StoreContext;
use crate::error::Result;
use crate::locks::{AppLocks, LockPolicy};
use crate::storage::{UnitOfWork, WriteOp};
use crate::types::{App, Build, Localization, ReconciliationResult, StalenessReport, Version};

use super::fingerprint::snapshot_fingerprint;

/// Brings one app's local version and localizations in line with the remote
pub struct VersionReconciler {
    ctx: StoreContext,
    locks: Arc<AppLocks>,
    lock_policy: LockPolicy,
}

impl VersionReconciler {
    pub fn new(ctx: StoreContext, locks: Arc<AppLocks>) -> Self {
        Self {
            ctx,
            locks,
            lock_policy: LockPolicy::default(),
        }
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    pub fn context(&self) -> &StoreContext {
        &self.ctx
    }

    pub fn locks(&self) -> &Arc<AppLocks> {
        &self.locks
    }

    pub fn lock_policy(&self) -> LockPolicy {
        self.lock_policy
    }

    /// Compare local and remote fingerprints without writing anything
    #[instrument(skip(self))]
    pub async fn check_staleness(&self, tenant_id: &str, app_id: Uuid) -> Result<StalenessReport> {
        let app = self.ctx.app(tenant_id, app_id).await?;
        let snapshot = self.fetch(tenant_id, &app).await?;

        let remote_fingerprint = snapshot_fingerprint(&snapshot);
        let local_fingerprint = self.ctx.store.fingerprint(app.id).await?;
        let up_to_date = local_fingerprint.as_deref() == Some(remote_fingerprint.as_str());

        debug!(%app_id, up_to_date, "staleness checked");
        Ok(StalenessReport {
            up_to_date,
            local_fingerprint,
            remote_fingerprint,
        })
    }

    /// Pull the app's remote state under the configured lock policy
    pub async fn reconcile(&self, tenant_id: &str, app_id: Uuid) -> Result<ReconciliationResult> {
        self.reconcile_with(tenant_id, app_id, self.lock_policy).await
    }

    /// Pull the app's remote state under an explicit lock policy
    #[instrument(skip(self))]
    pub async fn reconcile_with(
        &self,
        tenant_id: &str,
        app_id: Uuid,
        policy: LockPolicy,
    ) -> Result<ReconciliationResult> {
        let app = self.ctx.app(tenant_id, app_id).await?;
        let _guard = self.locks.acquire(tenant_id, app.id, policy).await?;
        self.pull_locked(tenant_id, &app).await
    }

    /// Pull for a caller that already holds the app's lock
    pub(crate) async fn pull_locked(
        &self,
        tenant_id: &str,
        app: &App,
    ) -> Result<ReconciliationResult> {
        let snapshot = self.fetch(tenant_id, app).await?;
        let fingerprint = snapshot_fingerprint(&snapshot);

        if self.ctx.store.fingerprint(app.id).await?.as_deref() == Some(fingerprint.as_str()) {
            debug!(app_id = %app.id, "remote unchanged, nothing to write");
            let version = match &snapshot.version {
                Some(remote) => self.local_version(app.id, &remote.remote_id).await?,
                None => None,
            };
            let localizations = match &version {
                Some(v) => self.ctx.store.localizations(v.id).await?,
                None => Vec::new(),
            };
            return Ok(ReconciliationResult {
                changed: false,
                version,
                localizations,
            });
        }

        let mut unit = UnitOfWork::new();
        if let Some(updated) = refreshed_app(app, &snapshot) {
            unit.push(WriteOp::PutApp(updated));
        }

        let (version, localizations) = match &snapshot.version {
            Some(remote) => {
                let version = self.plan_version(app, remote, &mut unit).await?;
                let localizations = self.plan_localizations(&version, &snapshot, &mut unit).await?;
                self.plan_build_selection(tenant_id, &version, remote, &mut unit)
                    .await?;
                (Some(version), localizations)
            }
            None => (None, Vec::new()),
        };

        unit.push(WriteOp::SetFingerprint {
            app_id: app.id,
            fingerprint,
        });
        self.ctx.store.commit(unit).await?;

        info!(
            app_id = %app.id,
            state = version.as_ref().map(|v| v.state.as_str()).unwrap_or("none"),
            locales = localizations.len(),
            "reconciled app"
        );
        Ok(ReconciliationResult {
            changed: true,
            version,
            localizations,
        })
    }

    async fn fetch(&self, tenant_id: &str, app: &App) -> Result<VersionSnapshot> {
        let token = self.ctx.token(tenant_id).await?;
        self.ctx
            .remote_call(
                tenant_id,
                "get_version_status",
                self.ctx.remote.get_version_status(&token, &app.remote_id),
            )
            .await
    }

    async fn local_version(&self, app_id: Uuid, remote_id: &str) -> Result<Option<Version>> {
        Ok(self
            .ctx
            .store
            .versions(app_id)
            .await?
            .into_iter()
            .find(|v| v.remote_id == remote_id))
    }

    async fn plan_version(
        &self,
        app: &App,
        remote: &RemoteVersion,
        unit: &mut UnitOfWork,
    ) -> Result<Version> {
        let version = match self.local_version(app.id, &remote.remote_id).await? {
            Some(existing) => {
                let state = remote.state;
                if existing.state.observe(state) == Transition::Regression {
                    warn!(
                        version = %existing.version_string,
                        from = %existing.state,
                        to = %state,
                        "remote reported a state regression, mirroring it"
                    );
                }
                Version {
                    version_string: remote.version_string.clone(),
                    state,
                    remote_state: remote.remote_state.clone(),
                    ..existing
                }
            }
            None => Version::from_remote(app.id, remote),
        };
        unit.push(WriteOp::PutVersion(version.clone()));
        Ok(version)
    }

    async fn plan_localizations(
        &self,
        version: &Version,
        snapshot: &VersionSnapshot,
        unit: &mut UnitOfWork,
    ) -> Result<Vec<Localization>> {
        let existing: HashMap<String, Uuid> = self
            .ctx
            .store
            .localizations(version.id)
            .await?
            .into_iter()
            .map(|l| (l.locale, l.id))
            .collect();

        let mut rows: Vec<Localization> = snapshot
            .localizations
            .iter()
            .map(|remote| {
                let id = existing.get(&remote.locale).copied().unwrap_or_else(Uuid::new_v4);
                Localization::from_remote(id, version.id, remote)
            })
            .collect();
        rows.sort_by(|a, b| a.locale.cmp(&b.locale));

        unit.push(WriteOp::ReplaceLocalizations {
            version_id: version.id,
            rows: rows.clone(),
        });
        Ok(rows)
    }

    async fn plan_build_selection(
        &self,
        tenant_id: &str,
        version: &Version,
        remote: &RemoteVersion,
        unit: &mut UnitOfWork,
    ) -> Result<()> {
        let local = self.ctx.store.builds(version.id).await?;

        let Some(selected_remote_id) = &remote.selected_build_id else {
            if local.iter().any(|b| b.selected) {
                unit.push(WriteOp::ClearBuildSelection {
                    version_id: version.id,
                });
            }
            return Ok(());
        };

        if let Some(build) = local.iter().find(|b| &b.remote_build_id == selected_remote_id) {
            if !build.selected {
                unit.push(WriteOp::SelectBuild {
                    version_id: version.id,
                    build_id: build.id,
                });
            }
            return Ok(());
        }

        // attached remotely but never listed here
        let token = self.ctx.token(tenant_id).await?;
        let remote_builds = self
            .ctx
            .remote_call(
                tenant_id,
                "list_builds_for_version",
                self.ctx
                    .remote
                    .list_builds_for_version(&token, &version.remote_id),
            )
            .await?;

        let rows = merge_builds(&local, version.id, &remote_builds);
        let selected = rows
            .iter()
            .find(|b| &b.remote_build_id == selected_remote_id)
            .map(|b| b.id);
        for row in rows {
            unit.push(WriteOp::PutBuild(row));
        }
        match selected {
            Some(build_id) => unit.push(WriteOp::SelectBuild {
                version_id: version.id,
                build_id,
            }),
            None => warn!(
                build = %selected_remote_id,
                version = %version.version_string,
                "selected build not found among the version's builds"
            ),
        }
        Ok(())
    }
}

/// App row with listing fields refreshed from the snapshot, if any changed
fn refreshed_app(app: &App, snapshot: &VersionSnapshot) -> Option<App> {
    let remote = &snapshot.app;
    if app.title == remote.name
        && app.bundle_id == remote.bundle_id
        && app.primary_locale == remote.primary_locale
    {
        return None;
    }
    Some(App {
        title: remote.name.clone(),
        bundle_id: remote.bundle_id.clone(),
        primary_locale: remote.primary_locale.clone(),
        ..app.clone()
    })
}

/// Build rows for `remote`, keeping ids and selection of builds already known
pub(crate) fn merge_builds(existing: &[Build], version_id: Uuid, remote: &[RemoteBuild]) -> Vec<Build> {
    let known: HashMap<&str, &Build> = existing
        .iter()
        .map(|b| (b.remote_build_id.as_str(), b))
        .collect();

    remote
        .iter()
        .map(|rb| match known.get(rb.remote_id.as_str()) {
            Some(build) => Build::from_remote(build.id, version_id, rb, build.selected),
            None => Build::from_remote(Uuid::new_v4(), version_id, rb, false),
        })
        .collect()
}
