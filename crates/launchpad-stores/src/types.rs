//! Common types for the remote store client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Target platform of an app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    /// Apple iOS
    Ios,
    /// Google Android
    Android,
}

impl Platform {
    /// Parse a remote platform string
    pub fn from_remote(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "IOS" => Some(Platform::Ios),
            "ANDROID" => Some(Platform::Android),
            _ => None,
        }
    }

    /// Remote wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "IOS",
            Platform::Android => "ANDROID",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release state of an app version
///
/// The local copy mirrors the remote state. Moves a caller initiates are
/// checked with [`VersionState::transition_to`]; states read back from the
/// remote are classified with [`VersionState::observe`] and always mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionState {
    /// Version exists but is in no state the release flow recognizes
    Draft,
    /// Version is editable and has no build attached
    BuildPending,
    /// Version is editable and has a build attached
    BuildSelected,
    /// Submitted and queued for review
    WaitingForReview,
    /// Under review
    InReview,
    /// Accepted for sale or distribution
    Approved,
    /// Rejected by review or pulled back by the developer
    Rejected,
}

/// Illegal version state move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: VersionState,
    pub to: VersionState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal version state transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// How a state read from the remote relates to the local one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    /// Legal progression
    Forward,
    /// Rejection, or a move the progression does not allow
    Regression,
}

impl VersionState {
    /// Normalize an App Store Connect `appStoreState`
    pub fn from_remote(app_store_state: &str, has_build: bool) -> Self {
        match app_store_state {
            "PREPARE_FOR_SUBMISSION" if has_build => VersionState::BuildSelected,
            "PREPARE_FOR_SUBMISSION" => VersionState::BuildPending,
            "READY_FOR_REVIEW" | "WAITING_FOR_REVIEW" => VersionState::WaitingForReview,
            "IN_REVIEW" => VersionState::InReview,
            "PENDING_DEVELOPER_RELEASE"
            | "PROCESSING_FOR_APP_STORE"
            | "PENDING_APPLE_RELEASE"
            | "READY_FOR_SALE"
            | "ACCEPTED"
            | "READY_FOR_DISTRIBUTION" => VersionState::Approved,
            "REJECTED" | "METADATA_REJECTED" | "DEVELOPER_REJECTED" | "INVALID_BINARY" => {
                VersionState::Rejected
            }
            _ => VersionState::Draft,
        }
    }

    /// Position in the release progression
    pub fn rank(&self) -> u8 {
        match self {
            VersionState::Draft => 0,
            VersionState::BuildPending => 1,
            VersionState::BuildSelected => 2,
            VersionState::WaitingForReview => 3,
            VersionState::InReview => 4,
            VersionState::Approved | VersionState::Rejected => 5,
        }
    }

    /// Whether the version left the review pipeline
    pub fn is_terminal(&self) -> bool {
        matches!(self, VersionState::Approved | VersionState::Rejected)
    }

    /// Validate a move to `next`
    pub fn transition_to(self, next: VersionState) -> Result<VersionState, InvalidTransition> {
        use VersionState::*;

        let legal = match (self, next) {
            (from, to) if from == to => true,
            (Approved, _) => false,
            (_, Rejected) => true,
            (Rejected, Draft) => false,
            (Rejected, _) => true,
            (BuildSelected, BuildPending) => true,
            (from, to) => to.rank() > from.rank(),
        };

        if legal {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Classify a state the remote reported
    ///
    /// The remote is the source of truth, so every classification is
    /// mirrored; a regression is only worth a warning.
    pub fn observe(self, next: VersionState) -> Transition {
        if self == next {
            Transition::Unchanged
        } else if next == VersionState::Rejected || self.transition_to(next).is_err() {
            Transition::Regression
        } else {
            Transition::Forward
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionState::Draft => "DRAFT",
            VersionState::BuildPending => "BUILD_PENDING",
            VersionState::BuildSelected => "BUILD_SELECTED",
            VersionState::WaitingForReview => "WAITING_FOR_REVIEW",
            VersionState::InReview => "IN_REVIEW",
            VersionState::Approved => "APPROVED",
            VersionState::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signing material for one tenant's API key
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCredential {
    /// Issuer ID from the API keys page
    pub issuer_id: Uuid,
    /// 10-character key ID
    pub key_id: String,
    /// PKCS#8 PEM private key (.p8 contents)
    pub private_key: String,
}

impl fmt::Debug for StoreCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredential")
            .field("issuer_id", &self.issuer_id)
            .field("key_id", &self.key_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// App as listed by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteApp {
    pub remote_id: String,
    pub name: String,
    pub bundle_id: String,
    pub primary_locale: String,
    pub sku: Option<String>,
    pub platform: Platform,
}

/// Version descriptor as reported by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVersion {
    pub remote_id: String,
    pub version_string: String,
    pub state: VersionState,
    /// Raw remote state, kept for display
    pub remote_state: String,
    pub platform: Platform,
    pub created_at: Option<DateTime<Utc>>,
    /// Build currently attached to the version
    pub selected_build_id: Option<String>,
}

/// Per-locale listing text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLocalization {
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

/// Latest version state plus its localizations for one app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub app: RemoteApp,
    /// `None` when the app has never had a version
    pub version: Option<RemoteVersion>,
    pub localizations: Vec<RemoteLocalization>,
}

/// Processing state of an uploaded build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildProcessingState {
    Processing,
    Valid,
    Invalid,
    Failed,
    Unknown,
}

impl BuildProcessingState {
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PROCESSING" => BuildProcessingState::Processing,
            "VALID" => BuildProcessingState::Valid,
            "INVALID" => BuildProcessingState::Invalid,
            "FAILED" => BuildProcessingState::Failed,
            _ => BuildProcessingState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildProcessingState::Processing => "PROCESSING",
            BuildProcessingState::Valid => "VALID",
            BuildProcessingState::Invalid => "INVALID",
            BuildProcessingState::Failed => "FAILED",
            BuildProcessingState::Unknown => "UNKNOWN",
        }
    }
}

/// Uploaded build that may be attached to a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBuild {
    pub remote_id: String,
    /// Build number (CFBundleVersion)
    pub build_number: String,
    pub processing_state: BuildProcessingState,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub expired: bool,
}

impl RemoteBuild {
    /// Whether the build can be attached to a version
    pub fn is_ready(&self) -> bool {
        self.processing_state == BuildProcessingState::Valid && !self.expired
    }
}

/// Acknowledgment of a review submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionAck {
    pub submission_id: String,
    pub accepted: bool,
}
