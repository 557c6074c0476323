//! Error types for Launchpad

use launchpad_stores::types::InvalidTransition;
use launchpad_stores::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageError;

/// Result type alias using LaunchpadError
pub type Result<T> = std::result::Result<T, LaunchpadError>;

/// Main error type for Launchpad operations
#[derive(Debug, Error)]
pub enum LaunchpadError {
    /// Normalized remote store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local storage errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Tenant has no complete store connection
    #[error("No store connection configured for tenant {0}")]
    MissingCredentials(String),

    /// Local entity missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input, rejected before any remote call
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Local precondition for a release step not met
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Another reconciliation holds the app's lock
    #[error("Reconciliation already in progress for app {app_id}, retry later")]
    Busy { app_id: Uuid },

    /// Remote reported a state the local version may not move to
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// Deadline exceeded
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// A remote mutation went through but the follow-up pull did not
    #[error("{operation} succeeded remotely but local state could not be refreshed: {source}")]
    Unreconciled {
        operation: String,
        #[source]
        source: Box<LaunchpadError>,
    },
}

/// Closed set of error categories surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    AgreementMissing,
    NotFound,
    Conflict,
    Validation,
    Precondition,
    Timeout,
    RemoteApi,
    Storage,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Auth => "auth",
            ErrorKind::AgreementMissing => "agreement_missing",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RemoteApi => "remote_api",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

impl LaunchpadError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LaunchpadError::Store(err) => match err {
                StoreError::Auth(_) => ErrorKind::Auth,
                StoreError::AgreementMissing(_) => ErrorKind::AgreementMissing,
                StoreError::NotFound(_) => ErrorKind::NotFound,
                StoreError::Conflict(_) => ErrorKind::Conflict,
                StoreError::Validation(_) => ErrorKind::Validation,
                StoreError::Timeout(_) => ErrorKind::Timeout,
                StoreError::RateLimited { .. } | StoreError::RemoteApi { .. } => {
                    ErrorKind::RemoteApi
                }
            },
            LaunchpadError::Config(_) => ErrorKind::Config,
            LaunchpadError::Storage(_) => ErrorKind::Storage,
            LaunchpadError::MissingCredentials(_) => ErrorKind::Auth,
            LaunchpadError::NotFound(_) => ErrorKind::NotFound,
            LaunchpadError::Validation(_) => ErrorKind::Validation,
            LaunchpadError::Precondition(_) => ErrorKind::Precondition,
            LaunchpadError::Busy { .. } => ErrorKind::Conflict,
            LaunchpadError::InvalidTransition(_) => ErrorKind::Conflict,
            LaunchpadError::Timeout(_) => ErrorKind::Timeout,
            LaunchpadError::Unreconciled { source, .. } => source.kind(),
        }
    }

    /// Whether retrying the same call unchanged may succeed
    ///
    /// `Unreconciled` is never retryable: the remote side already changed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LaunchpadError::Busy { .. } | LaunchpadError::Timeout(_) => true,
            LaunchpadError::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}
