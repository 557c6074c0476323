//! Local data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use launchpad_stores::{
    BuildProcessingState, Platform, RemoteApp, RemoteBuild, RemoteLocalization, RemoteVersion,
    StoreCredential, VersionState,
};

use crate::error::ErrorKind;

/// Tenant identifier
pub type TenantId = String;

/// Tenant with its store connection
///
/// All three credential fields must be present for remote operations.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: TenantId,
    pub name: Option<String>,
    pub issuer_id: Option<Uuid>,
    pub key_id: Option<String>,
    pub private_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TenantRecord {
    /// Tenant with no store connection
    pub fn new(id: impl Into<TenantId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            issuer_id: None,
            key_id: None,
            private_key: None,
            updated_at: Utc::now(),
        }
    }

    /// Complete signing material, if configured
    pub fn credential(&self) -> Option<StoreCredential> {
        match (&self.issuer_id, &self.key_id, &self.private_key) {
            (Some(issuer_id), Some(key_id), Some(private_key))
                if !key_id.is_empty() && !private_key.is_empty() =>
            {
                Some(StoreCredential {
                    issuer_id: *issuer_id,
                    key_id: key_id.clone(),
                    private_key: private_key.clone(),
                })
            }
            _ => None,
        }
    }
}

impl fmt::Debug for TenantRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("issuer_id", &self.issuer_id)
            .field("key_id", &self.key_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Imported app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub remote_id: String,
    pub platform: Platform,
    pub title: String,
    pub bundle_id: String,
    pub primary_locale: String,
    pub created_at: DateTime<Utc>,
}

impl App {
    /// New local row for a remote app
    pub fn from_remote(tenant_id: &str, remote: &RemoteApp) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            remote_id: remote.remote_id.clone(),
            platform: remote.platform,
            title: remote.name.clone(),
            bundle_id: remote.bundle_id.clone(),
            primary_locale: remote.primary_locale.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Local mirror of a remote version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: Uuid,
    pub app_id: Uuid,
    pub remote_id: String,
    pub version_string: String,
    pub state: VersionState,
    /// Raw remote state as last seen
    pub remote_state: String,
    pub created_at: DateTime<Utc>,
}

impl Version {
    /// New local row for a remote version
    pub fn from_remote(app_id: Uuid, remote: &RemoteVersion) -> Self {
        Self {
            id: Uuid::new_v4(),
            app_id,
            remote_id: remote.remote_id.clone(),
            version_string: remote.version_string.clone(),
            state: remote.state,
            remote_state: remote.remote_state.clone(),
            created_at: remote.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Listing text for one locale of a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localization {
    pub id: Uuid,
    pub version_id: Uuid,
    pub locale: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub whats_new: Option<String>,
    pub promotional_text: Option<String>,
    pub marketing_url: Option<String>,
    pub support_url: Option<String>,
}

impl Localization {
    /// Local row for a remote localization, reusing `id` when the locale already exists
    pub fn from_remote(id: Uuid, version_id: Uuid, remote: &RemoteLocalization) -> Self {
        Self {
            id,
            version_id,
            locale: remote.locale.clone(),
            title: remote.title.clone(),
            subtitle: remote.subtitle.clone(),
            description: remote.description.clone(),
            keywords: remote.keywords.clone(),
            whats_new: remote.whats_new.clone(),
            promotional_text: remote.promotional_text.clone(),
            marketing_url: remote.marketing_url.clone(),
            support_url: remote.support_url.clone(),
        }
    }
}

/// Build known for a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: Uuid,
    pub version_id: Uuid,
    pub remote_build_id: String,
    pub build_number: String,
    pub processing_state: BuildProcessingState,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub selected: bool,
}

impl Build {
    /// Local row for a remote build
    pub fn from_remote(id: Uuid, version_id: Uuid, remote: &RemoteBuild, selected: bool) -> Self {
        Self {
            id,
            version_id,
            remote_build_id: remote.remote_id.clone(),
            build_number: remote.build_number.clone(),
            processing_state: remote.processing_state,
            uploaded_at: remote.uploaded_at,
            selected,
        }
    }
}

/// Version plus its selected build, as returned by release operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub version: Version,
    pub selected_build: Option<Build>,
}

/// Outcome of a pull
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Whether anything was written
    pub changed: bool,
    /// Current version after the pull, `None` if the app has none remotely
    pub version: Option<Version>,
    pub localizations: Vec<Localization>,
}

/// Outcome of a read-only staleness check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessReport {
    pub up_to_date: bool,
    pub local_fingerprint: Option<String>,
    pub remote_fingerprint: String,
}

/// Outcome of a review submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub accepted: bool,
    pub submission_id: String,
    pub version: VersionDescriptor,
}

/// Error attached to a single app in a batch result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_requires_all_fields() {
        let mut tenant = TenantRecord::new("acme");
        assert!(tenant.credential().is_none());

        tenant.issuer_id = Some(Uuid::nil());
        tenant.key_id = Some("ABCDE12345".to_string());
        assert!(tenant.credential().is_none());

        tenant.private_key = Some("pem".to_string());
        let credential = tenant.credential().unwrap();
        assert_eq!(credential.key_id, "ABCDE12345");
    }

    #[test]
    fn test_tenant_debug_redacts_key() {
        let mut tenant = TenantRecord::new("acme");
        tenant.private_key = Some("super-secret".to_string());
        let debug = format!("{:?}", tenant);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_version_from_remote_mirrors_state() {
        let remote = RemoteVersion {
            remote_id: "v-1".to_string(),
            version_string: "1.0".to_string(),
            state: VersionState::BuildPending,
            remote_state: "PREPARE_FOR_SUBMISSION".to_string(),
            platform: Platform::Ios,
            created_at: None,
            selected_build_id: None,
        };
        let app_id = Uuid::new_v4();
        let version = Version::from_remote(app_id, &remote);
        assert_eq!(version.app_id, app_id);
        assert_eq!(version.state, VersionState::BuildPending);
        assert_eq!(version.remote_state, "PREPARE_FOR_SUBMISSION");
    }
}
