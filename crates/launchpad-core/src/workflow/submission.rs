//! Release submission workflow
//!
//! Drives a version through build selection and review submission. Every
//! remote mutation runs under the app's reconciliation lock and is followed
//! by a pull before the lock is released, so callers never see local state
//! from before their own mutation.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use launchpad_stores::{validate_version_string, BuildProcessingState, StoreError, VersionState};

use crate::context::StoreContext;
use crate::error::{ErrorKind, LaunchpadError, Result};
use crate::locks::AppLockGuard;
use crate::storage::{UnitOfWork, WriteOp};
use crate::sync::{merge_builds, VersionReconciler};
use crate::types::{App, Build, ReconciliationResult, SubmissionOutcome, Version, VersionDescriptor};

/// States a build may be selected in
const SELECTABLE: [VersionState; 3] = [
    VersionState::BuildPending,
    VersionState::BuildSelected,
    VersionState::Rejected,
];

/// States a version may be submitted from
const SUBMITTABLE: [VersionState; 2] = [VersionState::BuildSelected, VersionState::Rejected];

/// Remote release state machine
pub struct SubmissionCoordinator {
    reconciler: Arc<VersionReconciler>,
}

impl SubmissionCoordinator {
    pub fn new(reconciler: Arc<VersionReconciler>) -> Self {
        Self { reconciler }
    }

    fn ctx(&self) -> &StoreContext {
        self.reconciler.context()
    }

    /// Create a new version remotely, then pull it
    #[instrument(skip(self))]
    pub async fn create_version(
        &self,
        tenant_id: &str,
        app_id: Uuid,
        version_string: &str,
    ) -> Result<VersionDescriptor> {
        validate_version_string(version_string)?;
        let version_string = version_string.trim();

        let app = self.ctx().app(tenant_id, app_id).await?;
        let _guard = self.lock(tenant_id, &app).await?;

        let token = self.ctx().token(tenant_id).await?;
        let created = self
            .mutate(
                tenant_id,
                "create_version",
                self.ctx()
                    .remote
                    .create_version(&token, &app.remote_id, version_string, app.platform),
            )
            .await?;
        info!(version = version_string, remote_id = %created.remote_id, "version created remotely");

        self.pull_after("create_version", tenant_id, &app).await?;
        let version = self
            .local_by_remote_id(&app, &created.remote_id)
            .await
            .map_err(|source| unreconciled("create_version", source))?;
        self.descriptor(version).await
    }

    /// Builds uploaded for a version, recorded locally
    #[instrument(skip(self))]
    pub async fn list_builds_for_version(
        &self,
        tenant_id: &str,
        app_id: Uuid,
        version_id: Uuid,
    ) -> Result<Vec<Build>> {
        let app = self.ctx().app(tenant_id, app_id).await?;
        let version = self.ctx().version_of(&app, version_id).await?;
        let _guard = self.lock(tenant_id, &app).await?;

        self.refresh_builds(tenant_id, &version).await
    }

    /// Attach a build to a version, then pull
    ///
    /// `build_id` may be the local build id or the remote build id; it must
    /// appear in a fresh listing for the version.
    #[instrument(skip(self))]
    pub async fn select_build(
        &self,
        tenant_id: &str,
        app_id: Uuid,
        version_id: Uuid,
        build_id: &str,
    ) -> Result<VersionDescriptor> {
        let app = self.ctx().app(tenant_id, app_id).await?;
        let _guard = self.lock(tenant_id, &app).await?;
        let version = self.ctx().version_of(&app, version_id).await?;

        if !SELECTABLE.contains(&version.state) {
            return Err(LaunchpadError::Precondition(format!(
                "cannot select a build while version {} is {}",
                version.version_string, version.state
            )));
        }

        let builds = self.refresh_builds(tenant_id, &version).await?;
        let build = builds
            .iter()
            .find(|b| b.remote_build_id == build_id || b.id.to_string() == build_id)
            .ok_or_else(|| {
                LaunchpadError::Precondition(format!(
                    "build {} is not listed for version {}",
                    build_id, version.version_string
                ))
            })?;
        if build.processing_state != BuildProcessingState::Valid {
            return Err(StoreError::Conflict(format!(
                "build {} is still {}",
                build.build_number,
                build.processing_state.as_str()
            ))
            .into());
        }

        let token = self.ctx().token(tenant_id).await?;
        self.mutate(
            tenant_id,
            "select_build",
            self.ctx()
                .remote
                .select_build(&token, &version.remote_id, &build.remote_build_id),
        )
        .await?;
        info!(build = %build.build_number, version = %version.version_string, "build selected remotely");

        self.pull_after("select_build", tenant_id, &app).await?;
        let version = self.reload(version.id).await?;
        self.descriptor(version).await
    }

    /// Submit a version for review, then pull
    ///
    /// Refused locally, with no remote call, unless exactly one build is
    /// selected and the version is ready for submission.
    #[instrument(skip(self))]
    pub async fn submit_for_review(
        &self,
        tenant_id: &str,
        app_id: Uuid,
        version_id: Uuid,
    ) -> Result<SubmissionOutcome> {
        let app = self.ctx().app(tenant_id, app_id).await?;
        let _guard = self.lock(tenant_id, &app).await?;
        let version = self.ctx().version_of(&app, version_id).await?;

        let selected = self
            .ctx()
            .store
            .builds(version.id)
            .await?
            .into_iter()
            .filter(|b| b.selected)
            .count();
        if selected != 1 {
            return Err(LaunchpadError::Precondition(format!(
                "version {} needs exactly one selected build, found {}",
                version.version_string, selected
            )));
        }
        if !SUBMITTABLE.contains(&version.state) {
            return Err(LaunchpadError::Precondition(format!(
                "cannot submit version {} while it is {}",
                version.version_string, version.state
            )));
        }

        let token = self.ctx().token(tenant_id).await?;
        let ack = self
            .mutate(
                tenant_id,
                "submit_for_review",
                self.ctx()
                    .remote
                    .submit_for_review(&token, &version.remote_id, app.platform),
            )
            .await?;
        info!(
            version = %version.version_string,
            submission = %ack.submission_id,
            accepted = ack.accepted,
            "submitted for review"
        );

        self.pull_after("submit_for_review", tenant_id, &app).await?;
        let version = self.reload(version.id).await?;
        Ok(SubmissionOutcome {
            accepted: ack.accepted,
            submission_id: ack.submission_id,
            version: self.descriptor(version).await?,
        })
    }

    async fn lock(&self, tenant_id: &str, app: &App) -> Result<AppLockGuard> {
        self.reconciler
            .locks()
            .acquire(tenant_id, app.id, self.reconciler.lock_policy())
            .await
    }

    /// Run a remote mutation; a timeout leaves the remote outcome unknown
    async fn mutate<T, F>(&self, tenant_id: &str, operation: &str, call: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, StoreError>>,
    {
        let result = self.ctx().remote_call(tenant_id, operation, call).await;
        if let Err(err) = &result {
            if err.kind() == ErrorKind::Timeout {
                warn!(operation, "mutation outcome unknown, pull before retrying");
            }
        }
        result
    }

    async fn pull_after(
        &self,
        operation: &str,
        tenant_id: &str,
        app: &App,
    ) -> Result<ReconciliationResult> {
        self.reconciler
            .pull_locked(tenant_id, app)
            .await
            .map_err(|source| unreconciled(operation, source))
    }

    async fn refresh_builds(&self, tenant_id: &str, version: &Version) -> Result<Vec<Build>> {
        let token = self.ctx().token(tenant_id).await?;
        let remote = self
            .ctx()
            .remote_call(
                tenant_id,
                "list_builds_for_version",
                self.ctx()
                    .remote
                    .list_builds_for_version(&token, &version.remote_id),
            )
            .await?;

        let existing = self.ctx().store.builds(version.id).await?;
        let rows = merge_builds(&existing, version.id, &remote);
        let mut unit = UnitOfWork::new();
        for row in rows.iter().filter(|row| !existing.contains(row)) {
            unit.push(WriteOp::PutBuild(row.clone()));
        }
        self.ctx().store.commit(unit).await?;
        Ok(rows)
    }

    async fn local_by_remote_id(&self, app: &App, remote_id: &str) -> Result<Version> {
        self.ctx()
            .store
            .versions(app.id)
            .await?
            .into_iter()
            .find(|v| v.remote_id == remote_id)
            .ok_or_else(|| LaunchpadError::NotFound(format!("version {} after pull", remote_id)))
    }

    async fn reload(&self, version_id: Uuid) -> Result<Version> {
        self.ctx()
            .store
            .version(version_id)
            .await?
            .ok_or_else(|| LaunchpadError::NotFound(format!("version {}", version_id)))
    }

    async fn descriptor(&self, version: Version) -> Result<VersionDescriptor> {
        let selected_build = self
            .ctx()
            .store
            .builds(version.id)
            .await?
            .into_iter()
            .find(|b| b.selected);
        Ok(VersionDescriptor {
            version,
            selected_build,
        })
    }
}

fn unreconciled(operation: &str, source: LaunchpadError) -> LaunchpadError {
    warn!(operation, error = %source, "remote mutation applied but local pull failed");
    LaunchpadError::Unreconciled {
        operation: operation.to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::ListingStore;
    use crate::testing::{remote_app, remote_build, remote_localization, remote_version, Harness, TENANT};

    struct Release {
        h: Harness,
        coordinator: SubmissionCoordinator,
        app: App,
        version: Version,
    }

    /// App with an editable version pulled locally and two remote builds
    async fn release() -> Release {
        let h = Harness::new().await;
        let app = h.app_with_version("1001", &["en-US", "de-DE"]).await;
        h.remote.set_builds(
            "ver-1001",
            vec![
                remote_build("b-1", "41", BuildProcessingState::Valid),
                remote_build("b-2", "42", BuildProcessingState::Valid),
                remote_build("b-3", "43", BuildProcessingState::Processing),
            ],
        );
        let reconciler = Arc::new(h.reconciler());
        let version = reconciler
            .reconcile(TENANT, app.id)
            .await
            .unwrap()
            .version
            .unwrap();
        Release {
            coordinator: SubmissionCoordinator::new(reconciler),
            h,
            app,
            version,
        }
    }

    async fn selected_builds(h: &Harness, version_id: Uuid) -> Vec<Build> {
        h.store
            .builds(version_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|b| b.selected)
            .collect()
    }

    #[tokio::test]
    async fn test_empty_version_string_never_reaches_remote() {
        let r = release().await;
        let err = r
            .coordinator
            .create_version(TENANT, r.app.id, "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(r.h.remote.calls("create_version"), 0);

        let err = r
            .coordinator
            .create_version(TENANT, r.app.id, "1.x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(r.h.remote.calls("create_version"), 0);
    }

    #[tokio::test]
    async fn test_create_version_pulls_new_version() {
        let h = Harness::new().await;
        let remote = remote_app("2002");
        h.remote.add_app(
            remote.clone(),
            Some(remote_version("ver-old", "1.0", "READY_FOR_SALE", Some("b-0"))),
            vec![remote_localization("en-US")],
        );
        h.remote.set_builds("ver-old", vec![remote_build("b-0", "10", BuildProcessingState::Valid)]);
        let app = h.local_app(&remote).await;
        let reconciler = Arc::new(h.reconciler());
        reconciler.reconcile(TENANT, app.id).await.unwrap();
        let coordinator = SubmissionCoordinator::new(reconciler);

        let descriptor = coordinator.create_version(TENANT, app.id, " 1.1 ").await.unwrap();

        assert_eq!(descriptor.version.version_string, "1.1");
        assert_eq!(descriptor.version.state, VersionState::BuildPending);
        assert!(descriptor.selected_build.is_none());
        assert_eq!(h.store.versions(app.id).await.unwrap().len(), 2);
        let latest = h.store.latest_version(app.id).await.unwrap().unwrap();
        assert_eq!(latest.id, descriptor.version.id);
        assert_eq!(h.store.localizations(latest.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_version_conflicts_with_editable_version() {
        let r = release().await;
        let err = r
            .coordinator
            .create_version(TENANT, r.app.id, "2.0")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(r.h.store.versions(r.app.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_builds_records_rows() {
        let r = release().await;
        let builds = r
            .coordinator
            .list_builds_for_version(TENANT, r.app.id, r.version.id)
            .await
            .unwrap();
        assert_eq!(builds.len(), 3);
        assert!(builds.iter().all(|b| !b.selected));
        assert_eq!(r.h.store.builds(r.version.id).await.unwrap().len(), 3);

        // listing again keeps row ids
        let again = r
            .coordinator
            .list_builds_for_version(TENANT, r.app.id, r.version.id)
            .await
            .unwrap();
        let ids: Vec<_> = builds.iter().map(|b| b.id).collect();
        let again_ids: Vec<_> = again.iter().map(|b| b.id).collect();
        assert_eq!(ids, again_ids);
    }

    #[tokio::test]
    async fn test_select_build_leaves_exactly_one_selected() {
        let r = release().await;

        let descriptor = r
            .coordinator
            .select_build(TENANT, r.app.id, r.version.id, "b-2")
            .await
            .unwrap();
        assert_eq!(descriptor.version.state, VersionState::BuildSelected);
        assert_eq!(descriptor.selected_build.unwrap().remote_build_id, "b-2");
        assert_eq!(selected_builds(&r.h, r.version.id).await.len(), 1);

        // reselect by local id
        let b1 = r
            .h
            .store
            .builds(r.version.id)
            .await
            .unwrap()
            .into_iter()
            .find(|b| b.remote_build_id == "b-1")
            .unwrap();
        let descriptor = r
            .coordinator
            .select_build(TENANT, r.app.id, r.version.id, &b1.id.to_string())
            .await
            .unwrap();
        assert_eq!(descriptor.selected_build.unwrap().id, b1.id);
        let selected = selected_builds(&r.h, r.version.id).await;
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].remote_build_id, "b-1");
    }

    #[tokio::test]
    async fn test_unprocessed_build_conflicts_before_mutation() {
        let r = release().await;
        let err = r
            .coordinator
            .select_build(TENANT, r.app.id, r.version.id, "b-3")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(r.h.remote.calls("select_build"), 0);
    }

    #[tokio::test]
    async fn test_unlisted_build_is_a_precondition_failure() {
        let r = release().await;
        let err = r
            .coordinator
            .select_build(TENANT, r.app.id, r.version.id, "b-999")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(r.h.remote.calls("select_build"), 0);
    }

    #[tokio::test]
    async fn test_submit_without_selected_build_makes_no_remote_call() {
        let r = release().await;
        let err = r
            .coordinator
            .submit_for_review(TENANT, r.app.id, r.version.id)
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchpadError::Precondition(_)));
        assert_eq!(r.h.remote.calls("submit_for_review"), 0);
    }

    #[tokio::test]
    async fn test_full_release_flow() {
        let r = release().await;
        r.coordinator
            .select_build(TENANT, r.app.id, r.version.id, "b-1")
            .await
            .unwrap();

        let outcome = r
            .coordinator
            .submit_for_review(TENANT, r.app.id, r.version.id)
            .await
            .unwrap();

        assert!(outcome.accepted);
        assert_eq!(outcome.submission_id, "sub-ver-1001");
        assert_eq!(outcome.version.version.state, VersionState::WaitingForReview);
        assert_eq!(
            r.h.store.version(r.version.id).await.unwrap().unwrap().state,
            VersionState::WaitingForReview
        );

        // a second submission is refused locally
        let err = r
            .coordinator
            .submit_for_review(TENANT, r.app.id, r.version.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(r.h.remote.calls("submit_for_review"), 1);
    }

    #[tokio::test]
    async fn test_failed_pull_after_mutation_is_unreconciled() {
        let r = release().await;
        r.h.remote.fail(
            "get_version_status",
            launchpad_stores::StoreError::Timeout("slow".to_string()),
        );

        let err = r
            .coordinator
            .select_build(TENANT, r.app.id, r.version.id, "b-2")
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchpadError::Unreconciled { .. }));
        assert!(!err.is_retryable());
        assert_eq!(
            r.h.remote.version("1001").unwrap().selected_build_id.as_deref(),
            Some("b-2")
        );
        // local state still reflects the last successful pull
        assert!(selected_builds(&r.h, r.version.id).await.is_empty());

        r.h.remote.clear_failure("get_version_status");
        let pulled = r.coordinator.reconciler.reconcile(TENANT, r.app.id).await.unwrap();
        assert_eq!(pulled.version.unwrap().state, VersionState::BuildSelected);
        assert_eq!(selected_builds(&r.h, r.version.id).await.len(), 1);
    }
}
