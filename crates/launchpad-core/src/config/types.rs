//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use launchpad_stores::apple::{ConnectConfig, TokenPolicy, API_BASE_URL, DEFAULT_AUDIENCE};

use crate::locks::LockPolicy;
use crate::workflow::ImportSettings;

/// Main configuration for Launchpad
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Version of the config schema
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Remote API client settings
    pub api: ApiConfig,

    /// Bearer token settings
    pub auth: AuthConfig,

    /// Reconciliation settings
    pub sync: SyncConfig,

    /// Bulk import settings
    pub import: ImportConfig,

    /// Local state location
    pub storage: StorageConfig,
}

impl Config {
    /// Remote client settings derived from `api`
    pub fn connect_config(&self) -> ConnectConfig {
        ConnectConfig {
            base_url: self.api.base_url.clone(),
            request_timeout: Duration::from_secs(self.api.request_timeout_secs),
            max_retries: self.api.max_retries,
            retry_delay: Duration::from_millis(self.api.retry_delay_ms),
            page_limit: self.api.page_limit,
        }
    }

    /// Token lifetime settings derived from `auth`
    pub fn token_policy(&self) -> TokenPolicy {
        TokenPolicy {
            lifetime: chrono::Duration::seconds(self.auth.token_ttl_secs as i64),
            refresh_margin: chrono::Duration::seconds(self.auth.refresh_margin_secs as i64),
        }
    }

    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings {
            deadline: Duration::from_secs(self.import.deadline_secs),
            concurrency: self.import.concurrency,
        }
    }

    pub fn remote_deadline(&self) -> Duration {
        Duration::from_secs(self.sync.remote_deadline_secs)
    }
}

/// Remote API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API root, including the version segment
    pub base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Retries for idempotent reads
    pub max_retries: u32,

    /// Initial backoff in milliseconds
    pub retry_delay_ms: u64,

    /// Page size for list endpoints
    pub page_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
            page_limit: 200,
        }
    }
}

/// Bearer token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT audience claim
    pub audience: String,

    /// Token lifetime in seconds
    pub token_ttl_secs: u64,

    /// Re-issue this many seconds before expiry
    pub refresh_margin_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            audience: DEFAULT_AUDIENCE.to_string(),
            token_ttl_secs: 1200,
            refresh_margin_secs: 60,
        }
    }
}

/// Reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// What a second reconcile for the same app does while one is running
    pub lock_policy: LockPolicy,

    /// Deadline for a single remote call, in seconds
    pub remote_deadline_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lock_policy: LockPolicy::Wait,
            remote_deadline_secs: 60,
        }
    }
}

/// Bulk import configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Aggregate deadline for one import, in seconds
    pub deadline_secs: u64,

    /// Apps pulled in parallel
    pub concurrency: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 600,
            concurrency: 4,
        }
    }
}

/// Local state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// State file, relative paths resolve against the config directory
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".launchpad/state.json"),
        }
    }
}
