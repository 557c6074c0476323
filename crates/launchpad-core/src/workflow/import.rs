//! Tenant onboarding import

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use launchpad_stores::RemoteApp;

use crate::context::StoreContext;
use crate::error::{ErrorKind, LaunchpadError, Result};
use crate::storage::{UnitOfWork, WriteOp};
use crate::sync::VersionReconciler;
use crate::types::{App, OutcomeError};

/// Fan-out limits for one import
#[derive(Debug, Clone, Copy)]
pub struct ImportSettings {
    /// Aggregate deadline for the whole batch
    pub deadline: Duration,
    /// Apps pulled in parallel
    pub concurrency: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(600),
            concurrency: 4,
        }
    }
}

/// Result for one requested remote app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub remote_app_id: String,
    pub ok: bool,
    /// Local app id, when a row exists
    pub app_id: Option<Uuid>,
    /// App was already imported and was not pulled again
    pub already_imported: bool,
    pub error: Option<OutcomeError>,
}

impl ImportOutcome {
    fn imported(remote_app_id: &str, app_id: Uuid, already_imported: bool) -> Self {
        Self {
            remote_app_id: remote_app_id.to_string(),
            ok: true,
            app_id: Some(app_id),
            already_imported,
            error: None,
        }
    }

    fn failed(remote_app_id: &str, app_id: Option<Uuid>, err: &LaunchpadError) -> Self {
        Self {
            remote_app_id: remote_app_id.to_string(),
            ok: false,
            app_id,
            already_imported: false,
            error: Some(OutcomeError {
                kind: err.kind(),
                message: err.to_string(),
            }),
        }
    }
}

/// Per-app results of an import, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub results: Vec<ImportOutcome>,
}

impl ImportReport {
    /// Local ids of every app that imported successfully
    pub fn imported(&self) -> Vec<Uuid> {
        self.results
            .iter()
            .filter(|r| r.ok)
            .filter_map(|r| r.app_id)
            .collect()
    }

    /// Remote ids worth requesting again
    pub fn failed(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.ok)
            .map(|r| r.remote_app_id.as_str())
            .collect()
    }

    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|r| r.ok)
    }
}

/// Bulk import of remote apps for a tenant
pub struct ImportOrchestrator {
    reconciler: Arc<VersionReconciler>,
    settings: ImportSettings,
}

impl ImportOrchestrator {
    pub fn new(reconciler: Arc<VersionReconciler>, settings: ImportSettings) -> Self {
        Self {
            reconciler,
            settings,
        }
    }

    fn ctx(&self) -> &StoreContext {
        self.reconciler.context()
    }

    /// Apps visible to the tenant's API key
    #[instrument(skip(self))]
    pub async fn list_remote_apps(&self, tenant_id: &str) -> Result<Vec<RemoteApp>> {
        let token = self.ctx().token(tenant_id).await?;
        self.ctx()
            .remote_call(tenant_id, "list_apps", self.ctx().remote.list_apps(&token))
            .await
    }

    /// Import the requested remote apps and pull each one once
    ///
    /// One app failing never aborts the batch. Apps still running when the
    /// deadline passes are reported as timed out; finished ones are kept.
    #[instrument(skip(self, remote_app_ids), fields(requested = remote_app_ids.len()))]
    pub async fn import_selected(
        &self,
        tenant_id: &str,
        remote_app_ids: &[String],
    ) -> Result<ImportReport> {
        let deadline = Instant::now() + self.settings.deadline;

        let mut requested: Vec<&str> = Vec::new();
        for id in remote_app_ids {
            let id = id.trim();
            if !id.is_empty() && !requested.contains(&id) {
                requested.push(id);
            }
        }

        let listing = match tokio::time::timeout_at(deadline, self.list_remote_apps(tenant_id)).await {
            Ok(listing) => listing,
            Err(_) => Err(LaunchpadError::Timeout("listing apps for import".to_string())),
        };
        let remote_apps: HashMap<String, RemoteApp> = match listing {
            Ok(apps) => apps.into_iter().map(|a| (a.remote_id.clone(), a)).collect(),
            Err(err) => {
                warn!(tenant = tenant_id, error = %err, "cannot list remote apps, nothing imported");
                return Ok(ImportReport {
                    results: requested
                        .iter()
                        .map(|id| ImportOutcome::failed(id, None, &err))
                        .collect(),
                });
            }
        };

        let mut outcomes: HashMap<String, ImportOutcome> = HashMap::new();
        let mut to_pull: Vec<(String, Uuid)> = Vec::new();
        for id in &requested {
            let Some(remote) = remote_apps.get(*id) else {
                let err = LaunchpadError::NotFound(format!("remote app {}", id));
                outcomes.insert(id.to_string(), ImportOutcome::failed(id, None, &err));
                continue;
            };

            match self.ensure_app_row(tenant_id, remote).await {
                Ok((app, true)) => {
                    outcomes.insert(id.to_string(), ImportOutcome::imported(id, app.id, true));
                }
                Ok((app, false)) => to_pull.push((id.to_string(), app.id)),
                Err(err) => {
                    outcomes.insert(id.to_string(), ImportOutcome::failed(id, None, &err));
                }
            }
        }

        self.pull_all(tenant_id, to_pull, deadline, &mut outcomes).await;

        let report = ImportReport {
            results: requested
                .iter()
                .filter_map(|id| outcomes.remove(*id))
                .collect(),
        };
        info!(
            tenant = tenant_id,
            imported = report.imported().len(),
            failed = report.failed().len(),
            "import finished"
        );
        Ok(report)
    }

    /// Local row for `remote`, and whether it was already fully imported
    async fn ensure_app_row(&self, tenant_id: &str, remote: &RemoteApp) -> Result<(App, bool)> {
        let store = &self.ctx().store;
        if let Some(app) = store.app_by_remote_id(tenant_id, &remote.remote_id).await? {
            let pulled = store.fingerprint(app.id).await?.is_some();
            return Ok((app, pulled));
        }

        let app = App::from_remote(tenant_id, remote);
        store
            .commit(UnitOfWork::new().with(WriteOp::PutApp(app.clone())))
            .await?;
        info!(remote_id = %remote.remote_id, app_id = %app.id, "app row created");
        Ok((app, false))
    }

    async fn pull_all(
        &self,
        tenant_id: &str,
        apps: Vec<(String, Uuid)>,
        deadline: Instant,
        outcomes: &mut HashMap<String, ImportOutcome>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut pending: HashMap<String, Uuid> = apps.iter().cloned().collect();
        let mut tasks = JoinSet::new();

        for (remote_id, app_id) in apps {
            let reconciler = self.reconciler.clone();
            let semaphore = semaphore.clone();
            let tenant = tenant_id.to_string();
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        let result = reconciler.reconcile(&tenant, app_id).await;
                        drop(permit);
                        result
                    }
                    Err(_) => Err(LaunchpadError::Timeout("import cancelled".to_string())),
                };
                (remote_id, app_id, result)
            });
        }

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((remote_id, app_id, result)))) => {
                    pending.remove(&remote_id);
                    let outcome = match result {
                        Ok(_) => ImportOutcome::imported(&remote_id, app_id, false),
                        Err(err) => {
                            warn!(remote_id = %remote_id, error = %err, "app pull failed");
                            ImportOutcome::failed(&remote_id, Some(app_id), &err)
                        }
                    };
                    outcomes.insert(remote_id, outcome);
                }
                Ok(Some(Err(join_err))) => {
                    warn!(error = %join_err, "import task ended abnormally");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(unfinished = pending.len(), "import deadline reached");
                    tasks.abort_all();
                    break;
                }
            }
        }

        for (remote_id, app_id) in pending {
            let err = if Instant::now() >= deadline {
                LaunchpadError::Timeout(format!("import of {} did not finish in time", remote_id))
            } else {
                LaunchpadError::Precondition(format!("import of {} was interrupted", remote_id))
            };
            outcomes.insert(remote_id.clone(), ImportOutcome::failed(&remote_id, Some(app_id), &err));
        }
    }
}

/// Kinds that need tenant action before an import can succeed
pub fn needs_tenant_action(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Auth | ErrorKind::AgreementMissing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ListingStore;
    use crate::testing::{remote_app, remote_localization, remote_version, Harness, TENANT};
    use launchpad_stores::StoreError;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn add_remote(h: &Harness, remote_id: &str) {
        h.remote.add_app(
            remote_app(remote_id),
            Some(remote_version(
                &format!("ver-{}", remote_id),
                "1.0",
                "PREPARE_FOR_SUBMISSION",
                None,
            )),
            vec![remote_localization("en-US")],
        );
    }

    fn orchestrator(h: &Harness, settings: ImportSettings) -> ImportOrchestrator {
        ImportOrchestrator::new(Arc::new(h.reconciler()), settings)
    }

    #[tokio::test]
    async fn test_import_creates_apps_and_pulls_each_once() {
        let h = Harness::new().await;
        add_remote(&h, "1");
        add_remote(&h, "2");
        add_remote(&h, "3");

        let report = orchestrator(&h, ImportSettings::default())
            .import_selected(TENANT, &ids(&["1", "3"]))
            .await
            .unwrap();

        assert!(report.all_ok());
        assert_eq!(report.imported().len(), 2);
        assert_eq!(h.store.apps(TENANT).await.unwrap().len(), 2);
        assert_eq!(h.remote.calls("get_version_status"), 2);
        for app_id in report.imported() {
            assert!(h.store.latest_version(app_id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_agreement_missing_fails_every_app_without_rows() {
        let h = Harness::new().await;
        add_remote(&h, "1");
        h.remote.fail(
            "list_apps",
            StoreError::AgreementMissing("The Program License Agreement has expired".to_string()),
        );

        let report = orchestrator(&h, ImportSettings::default())
            .import_selected(TENANT, &ids(&["1", "2", "3"]))
            .await
            .unwrap();

        assert_eq!(report.results.len(), 3);
        for outcome in &report.results {
            assert!(!outcome.ok);
            let error = outcome.error.as_ref().unwrap();
            assert_eq!(error.kind, ErrorKind::AgreementMissing);
            assert!(needs_tenant_action(error.kind));
        }
        assert!(h.store.apps(TENANT).await.unwrap().is_empty());
        assert_eq!(h.remote.calls("list_apps"), 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_batch() {
        let h = Harness::new().await;
        add_remote(&h, "1");
        add_remote(&h, "2");

        let report = orchestrator(&h, ImportSettings::default())
            .import_selected(TENANT, &ids(&["1", "missing", "2"]))
            .await
            .unwrap();

        let order: Vec<_> = report.results.iter().map(|r| r.remote_app_id.as_str()).collect();
        assert_eq!(order, vec!["1", "missing", "2"]);
        assert_eq!(report.failed(), vec!["missing"]);
        assert_eq!(
            report.results[1].error.as_ref().unwrap().kind,
            ErrorKind::NotFound
        );
        assert_eq!(report.imported().len(), 2);
    }

    #[tokio::test]
    async fn test_reimport_skips_pulled_apps_and_retries_failed_ones() {
        let h = Harness::new().await;
        add_remote(&h, "1");
        add_remote(&h, "2");
        let orchestrator = orchestrator(&h, ImportSettings::default());

        orchestrator.import_selected(TENANT, &ids(&["1"])).await.unwrap();

        // "2" gets a row but its pull fails
        h.remote.fail(
            "get_version_status",
            StoreError::RemoteApi {
                status: 500,
                message: "boom".to_string(),
            },
        );
        let report = orchestrator.import_selected(TENANT, &ids(&["2"])).await.unwrap();
        assert_eq!(report.failed(), vec!["2"]);
        assert!(report.results[0].app_id.is_some());
        h.remote.clear_failure("get_version_status");

        let calls = h.remote.calls("get_version_status");
        let report = orchestrator
            .import_selected(TENANT, &ids(&["1", "2"]))
            .await
            .unwrap();
        assert!(report.all_ok());
        assert!(report.results[0].already_imported);
        assert!(!report.results[1].already_imported);
        assert_eq!(h.remote.calls("get_version_status"), calls + 1);
        assert_eq!(h.store.apps(TENANT).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_deadline_keeps_finished_results() {
        let h = Harness::new().await;
        add_remote(&h, "1");
        add_remote(&h, "2");
        h.remote.set_delay(Duration::from_millis(300));

        let settings = ImportSettings {
            deadline: Duration::from_millis(750),
            concurrency: 1,
        };
        let report = orchestrator(&h, settings)
            .import_selected(TENANT, &ids(&["1", "2"]))
            .await
            .unwrap();

        // listing and the first pull take 300ms each, the second cannot finish
        let timed_out: Vec<_> = report
            .results
            .iter()
            .filter(|r| r.error.as_ref().is_some_and(|e| e.kind == ErrorKind::Timeout))
            .collect();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.imported().len(), 1);
        assert_eq!(timed_out.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_credentials_reported_per_app() {
        let h = Harness::new().await;
        let orchestrator = orchestrator(&h, ImportSettings::default());
        let report = orchestrator
            .import_selected("unknown-tenant", &ids(&["1"]))
            .await
            .unwrap();
        assert_eq!(report.results[0].error.as_ref().unwrap().kind, ErrorKind::Auth);
        assert_eq!(h.remote.calls("list_apps"), 0);
    }
}
