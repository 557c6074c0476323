//! In-memory tables and constraint checks

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::types::{App, Build, Localization, TenantId, TenantRecord, Version};

use super::unit_of_work::{UnitOfWork, WriteOp};
use super::StorageError;

/// Whole local state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tables {
    pub tenants: BTreeMap<TenantId, TenantRecord>,
    pub apps: BTreeMap<Uuid, App>,
    pub versions: BTreeMap<Uuid, Version>,
    pub localizations: BTreeMap<Uuid, Localization>,
    pub builds: BTreeMap<Uuid, Build>,
    /// Remote fingerprint per app id
    pub fingerprints: BTreeMap<Uuid, String>,
}

impl Tables {
    /// Apply a unit of work to a copy of these tables
    ///
    /// Returns the new tables only if every op applies and every constraint
    /// holds afterwards; `self` is never modified.
    pub fn apply(&self, unit: &UnitOfWork) -> Result<Tables, StorageError> {
        let mut next = self.clone();
        for op in unit.ops() {
            next.apply_op(op)?;
        }
        next.check_selection()?;
        Ok(next)
    }

    fn apply_op(&mut self, op: &WriteOp) -> Result<(), StorageError> {
        match op {
            WriteOp::PutTenant(tenant) => {
                self.tenants.insert(tenant.id.clone(), tenant.clone());
            }
            WriteOp::PutApp(app) => {
                if !self.tenants.contains_key(&app.tenant_id) {
                    return Err(missing("tenant", &app.tenant_id));
                }
                let duplicate = self.apps.values().any(|existing| {
                    existing.id != app.id
                        && existing.tenant_id == app.tenant_id
                        && existing.remote_id == app.remote_id
                });
                if duplicate {
                    return Err(StorageError::Constraint(format!(
                        "app with remote id {} already exists for tenant {}",
                        app.remote_id, app.tenant_id
                    )));
                }
                self.apps.insert(app.id, app.clone());
            }
            WriteOp::PutVersion(version) => {
                if !self.apps.contains_key(&version.app_id) {
                    return Err(missing("app", version.app_id));
                }
                let duplicate = self.versions.values().any(|existing| {
                    existing.id != version.id
                        && existing.app_id == version.app_id
                        && existing.remote_id == version.remote_id
                });
                if duplicate {
                    return Err(StorageError::Constraint(format!(
                        "version with remote id {} already exists for app {}",
                        version.remote_id, version.app_id
                    )));
                }
                self.versions.insert(version.id, version.clone());
            }
            WriteOp::ReplaceLocalizations { version_id, rows } => {
                if !self.versions.contains_key(version_id) {
                    return Err(missing("version", version_id));
                }
                let mut locales = BTreeSet::new();
                for row in rows {
                    if row.version_id != *version_id {
                        return Err(StorageError::Constraint(format!(
                            "localization {} belongs to version {}, not {}",
                            row.id, row.version_id, version_id
                        )));
                    }
                    if !locales.insert(row.locale.as_str()) {
                        return Err(StorageError::Constraint(format!(
                            "duplicate locale {} for version {}",
                            row.locale, version_id
                        )));
                    }
                }
                self.localizations.retain(|_, l| l.version_id != *version_id);
                for row in rows {
                    self.localizations.insert(row.id, row.clone());
                }
            }
            WriteOp::PutBuild(build) => {
                if !self.versions.contains_key(&build.version_id) {
                    return Err(missing("version", build.version_id));
                }
                let duplicate = self.builds.values().any(|existing| {
                    existing.id != build.id
                        && existing.version_id == build.version_id
                        && existing.remote_build_id == build.remote_build_id
                });
                if duplicate {
                    return Err(StorageError::Constraint(format!(
                        "build {} already recorded for version {}",
                        build.remote_build_id, build.version_id
                    )));
                }
                self.builds.insert(build.id, build.clone());
            }
            WriteOp::SelectBuild { version_id, build_id } => {
                match self.builds.get(build_id) {
                    Some(build) if build.version_id == *version_id => {}
                    Some(_) => {
                        return Err(StorageError::Constraint(format!(
                            "build {} does not belong to version {}",
                            build_id, version_id
                        )))
                    }
                    None => return Err(missing("build", build_id)),
                }
                for build in self.builds.values_mut() {
                    if build.version_id == *version_id {
                        build.selected = build.id == *build_id;
                    }
                }
            }
            WriteOp::ClearBuildSelection { version_id } => {
                for build in self.builds.values_mut() {
                    if build.version_id == *version_id {
                        build.selected = false;
                    }
                }
            }
            WriteOp::SetFingerprint { app_id, fingerprint } => {
                if !self.apps.contains_key(app_id) {
                    return Err(missing("app", app_id));
                }
                self.fingerprints.insert(*app_id, fingerprint.clone());
            }
        }
        Ok(())
    }

    fn check_selection(&self) -> Result<(), StorageError> {
        let mut selected = BTreeSet::new();
        for build in self.builds.values().filter(|b| b.selected) {
            if !selected.insert(build.version_id) {
                return Err(StorageError::Constraint(format!(
                    "more than one selected build for version {}",
                    build.version_id
                )));
            }
        }
        Ok(())
    }
}

fn missing(entity: &str, id: impl std::fmt::Display) -> StorageError {
    StorageError::Constraint(format!("{} {} does not exist", entity, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use launchpad_stores::{BuildProcessingState, Platform, VersionState};

    fn seeded() -> (Tables, App, Version) {
        let tenant = TenantRecord::new("acme");
        let app = App {
            id: Uuid::new_v4(),
            tenant_id: "acme".to_string(),
            remote_id: "1001".to_string(),
            platform: Platform::Ios,
            title: "Rocket".to_string(),
            bundle_id: "com.acme.rocket".to_string(),
            primary_locale: "en-US".to_string(),
            created_at: Utc::now(),
        };
        let version = Version {
            id: Uuid::new_v4(),
            app_id: app.id,
            remote_id: "v-1".to_string(),
            version_string: "1.0".to_string(),
            state: VersionState::BuildPending,
            remote_state: "PREPARE_FOR_SUBMISSION".to_string(),
            created_at: Utc::now(),
        };
        let unit = UnitOfWork::new()
            .with(WriteOp::PutTenant(tenant))
            .with(WriteOp::PutApp(app.clone()))
            .with(WriteOp::PutVersion(version.clone()));
        (Tables::default().apply(&unit).unwrap(), app, version)
    }

    fn build(version_id: Uuid, remote: &str, selected: bool) -> Build {
        Build {
            id: Uuid::new_v4(),
            version_id,
            remote_build_id: remote.to_string(),
            build_number: remote.to_string(),
            processing_state: BuildProcessingState::Valid,
            uploaded_at: None,
            selected,
        }
    }

    fn localization(version_id: Uuid, locale: &str) -> Localization {
        Localization {
            id: Uuid::new_v4(),
            version_id,
            locale: locale.to_string(),
            title: None,
            subtitle: None,
            description: Some(format!("{} description", locale)),
            keywords: None,
            whats_new: None,
            promotional_text: None,
            marketing_url: None,
            support_url: None,
        }
    }

    #[test]
    fn test_app_requires_tenant() {
        let (tables, app, _) = seeded();
        let mut orphan = app.clone();
        orphan.id = Uuid::new_v4();
        orphan.tenant_id = "nobody".to_string();
        let err = tables
            .apply(&UnitOfWork::new().with(WriteOp::PutApp(orphan)))
            .unwrap_err();
        assert!(err.to_string().contains("tenant nobody"));
    }

    #[test]
    fn test_app_remote_id_unique_per_tenant() {
        let (tables, app, _) = seeded();
        let mut twin = app.clone();
        twin.id = Uuid::new_v4();
        assert!(tables
            .apply(&UnitOfWork::new().with(WriteOp::PutApp(twin)))
            .is_err());
    }

    #[test]
    fn test_replace_localizations_is_wholesale() {
        let (tables, _, version) = seeded();
        let first = UnitOfWork::new().with(WriteOp::ReplaceLocalizations {
            version_id: version.id,
            rows: vec![localization(version.id, "en-US"), localization(version.id, "de-DE")],
        });
        let tables = tables.apply(&first).unwrap();
        assert_eq!(tables.localizations.len(), 2);

        let second = UnitOfWork::new().with(WriteOp::ReplaceLocalizations {
            version_id: version.id,
            rows: vec![localization(version.id, "fr-FR")],
        });
        let tables = tables.apply(&second).unwrap();
        let locales: Vec<_> = tables.localizations.values().map(|l| l.locale.as_str()).collect();
        assert_eq!(locales, vec!["fr-FR"]);
    }

    #[test]
    fn test_duplicate_locale_rejected() {
        let (tables, _, version) = seeded();
        let unit = UnitOfWork::new().with(WriteOp::ReplaceLocalizations {
            version_id: version.id,
            rows: vec![localization(version.id, "en-US"), localization(version.id, "en-US")],
        });
        assert!(tables.apply(&unit).is_err());
    }

    #[test]
    fn test_select_build_unselects_previous() {
        let (tables, _, version) = seeded();
        let first = build(version.id, "100", true);
        let second = build(version.id, "101", false);
        let tables = tables
            .apply(
                &UnitOfWork::new()
                    .with(WriteOp::PutBuild(first.clone()))
                    .with(WriteOp::PutBuild(second.clone())),
            )
            .unwrap();

        let tables = tables
            .apply(&UnitOfWork::new().with(WriteOp::SelectBuild {
                version_id: version.id,
                build_id: second.id,
            }))
            .unwrap();
        assert!(!tables.builds[&first.id].selected);
        assert!(tables.builds[&second.id].selected);
    }

    #[test]
    fn test_two_selected_builds_rejected() {
        let (tables, _, version) = seeded();
        let unit = UnitOfWork::new()
            .with(WriteOp::PutBuild(build(version.id, "100", true)))
            .with(WriteOp::PutBuild(build(version.id, "101", true)));
        assert!(tables.apply(&unit).is_err());
    }

    #[test]
    fn test_failed_unit_leaves_tables_untouched() {
        let (tables, app, version) = seeded();
        let before = tables.clone();
        let unit = UnitOfWork::new()
            .with(WriteOp::SetFingerprint {
                app_id: app.id,
                fingerprint: "abc".to_string(),
            })
            .with(WriteOp::SelectBuild {
                version_id: version.id,
                build_id: Uuid::new_v4(),
            });
        assert!(tables.apply(&unit).is_err());
        assert_eq!(tables, before);
    }
}
