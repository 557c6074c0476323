//! App Store Connect API integration
//!
//! JSON:API client for the parts of App Store Connect the release flow needs:
//! apps, versions with their localizations, builds and review submissions.

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::errors::classify;
use super::token::BearerToken;
use super::validate_version_string;
use crate::error::{Result, StoreError};
use crate::traits::RemoteStore;
use crate::types::*;

/// Base URL for App Store Connect API v1.
pub const API_BASE_URL: &str = "https://api.appstoreconnect.apple.com/v1";

/// Client settings
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub base_url: String,
    /// Per-request deadline
    pub request_timeout: Duration,
    /// Retries for idempotent reads
    pub max_retries: u32,
    /// First backoff step; doubles per attempt
    pub retry_delay: Duration,
    /// Page size for list endpoints
    pub page_limit: u32,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            page_limit: 200,
        }
    }
}

/// App Store Connect API client
pub struct AppStoreConnect {
    config: ConnectConfig,
    client: Client,
}

impl AppStoreConnect {
    /// Create a new App Store Connect client
    pub fn new(config: ConnectConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StoreError::RemoteApi {
                status: 0,
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
        }
    }

    /// Single attempt; `None` for empty (204) responses
    async fn send(
        &self,
        token: &BearerToken,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Option<serde_json::Value>> {
        let url = self.url(endpoint);
        debug!("API request: {} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", token.authorization())
            .header("Content-Type", "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify(status.as_u16(), &error_text, retry_after));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text).map(Some).map_err(|e| StoreError::RemoteApi {
            status: status.as_u16(),
            message: format!("Failed to parse API response: {}", e),
        })
    }

    /// GET with bounded retries
    async fn get<T: DeserializeOwned>(&self, token: &BearerToken, endpoint: &str) -> Result<T> {
        let mut attempt = 0;

        loop {
            match self.send(token, Method::GET, endpoint, None).await {
                Ok(value) => return decode(value),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    let delay = match &err {
                        StoreError::RateLimited {
                            retry_after: Some(secs),
                        } => Duration::from_secs(*secs),
                        _ => self.config.retry_delay * 2u32.saturating_pow(attempt),
                    };
                    attempt += 1;
                    warn!(
                        "{}, retrying in {:?} ({}/{})",
                        err, delay, attempt, self.config.max_retries
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Mutations are sent exactly once
    async fn mutate<T: DeserializeOwned>(
        &self,
        token: &BearerToken,
        method: Method,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let value = self.send(token, method, endpoint, Some(&body)).await?;
        decode(value)
    }

    async fn mutate_no_content(
        &self,
        token: &BearerToken,
        method: Method,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<()> {
        self.send(token, method, endpoint, Some(&body)).await?;
        Ok(())
    }

    async fn fetch_version(&self, token: &BearerToken, version_id: &str) -> Result<RemoteVersion> {
        let endpoint = format!("/appStoreVersions/{}", version_id);
        let response: Document<Resource<VersionAttributes>> = self.get(token, &endpoint).await?;
        let build = self.fetch_selected_build(token, version_id).await?;
        Ok(response.data.into_remote(build))
    }

    async fn fetch_selected_build(
        &self,
        token: &BearerToken,
        version_id: &str,
    ) -> Result<Option<String>> {
        let endpoint = format!("/appStoreVersions/{}/relationships/build", version_id);
        let response: Relationship = self.get(token, &endpoint).await?;
        Ok(response.data.map(|d| d.id))
    }

    async fn fetch_version_app_id(&self, token: &BearerToken, version_id: &str) -> Result<String> {
        let endpoint = format!("/appStoreVersions/{}/relationships/app", version_id);
        let response: Relationship = self.get(token, &endpoint).await?;
        response
            .data
            .map(|d| d.id)
            .ok_or_else(|| StoreError::NotFound(format!("No app linked to version {}", version_id)))
    }

    /// Names and subtitles live on the app info, keyed by locale
    async fn fetch_app_info_names(
        &self,
        token: &BearerToken,
        app_id: &str,
    ) -> Result<HashMap<String, AppInfoLocalizationAttributes>> {
        let endpoint = format!("/apps/{}/appInfos", app_id);
        let infos: Document<Vec<ResourceId>> = self.get(token, &endpoint).await?;

        let Some(info) = infos.data.first() else {
            return Ok(HashMap::new());
        };

        let endpoint = format!("/appInfos/{}/appInfoLocalizations", info.id);
        let locs: Document<Vec<Resource<AppInfoLocalizationAttributes>>> =
            self.get(token, &endpoint).await?;

        Ok(locs
            .data
            .into_iter()
            .map(|l| (l.attributes.locale.clone(), l.attributes))
            .collect())
    }

    /// An unsubmitted review submission left behind by an interrupted attempt
    async fn find_open_submission(
        &self,
        token: &BearerToken,
        app_id: &str,
        platform: Platform,
    ) -> Result<Option<String>> {
        let endpoint = format!(
            "/reviewSubmissions?filter[app]={}&filter[state]=READY_FOR_REVIEW&filter[platform]={}&limit=1",
            app_id,
            platform.as_str()
        );
        let open: Document<Vec<Resource<ReviewSubmissionAttributes>>> =
            self.get(token, &endpoint).await?;
        Ok(open.data.into_iter().next().map(|r| r.id))
    }

    fn require_apple_platform(platform: Platform) -> Result<()> {
        if platform == Platform::Android {
            return Err(StoreError::Validation(
                "App Store Connect does not host Android apps".to_string(),
            ));
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(value: Option<serde_json::Value>) -> Result<T> {
    serde_json::from_value(value.unwrap_or(serde_json::Value::Null)).map_err(|e| {
        StoreError::RemoteApi {
            status: 200,
            message: format!("Failed to parse API response: {}", e),
        }
    })
}

fn parse_date(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}

#[async_trait::async_trait]
impl RemoteStore for AppStoreConnect {
    fn name(&self) -> &str {
        "App Store Connect"
    }

    #[instrument(skip(self, token))]
    async fn list_apps(&self, token: &BearerToken) -> Result<Vec<RemoteApp>> {
        let mut apps = Vec::new();
        let mut next = Some(format!("/apps?limit={}", self.config.page_limit));

        while let Some(endpoint) = next {
            let page: Document<Vec<Resource<AppAttributes>>> = self.get(token, &endpoint).await?;
            apps.extend(page.data.into_iter().map(|r| r.into_remote()));
            next = page.links.and_then(|l| l.next);
        }

        info!(count = apps.len(), "listed apps");
        Ok(apps)
    }

    #[instrument(skip(self, token))]
    async fn get_version_status(
        &self,
        token: &BearerToken,
        app_remote_id: &str,
    ) -> Result<VersionSnapshot> {
        let endpoint = format!("/apps/{}", app_remote_id);
        let app: Document<Resource<AppAttributes>> = self.get(token, &endpoint).await?;
        let app = app.data.into_remote();

        let endpoint = format!("/apps/{}/appStoreVersions?limit=10", app_remote_id);
        let versions: Document<Vec<Resource<VersionAttributes>>> =
            self.get(token, &endpoint).await?;

        // newest by creation date; the API lists newest first when dates are absent
        let latest = versions
            .data
            .into_iter()
            .enumerate()
            .max_by(|(ai, a), (bi, b)| {
                let ad = parse_date(a.attributes.created_date.clone());
                let bd = parse_date(b.attributes.created_date.clone());
                ad.cmp(&bd).then(bi.cmp(ai))
            })
            .map(|(_, v)| v);

        let Some(latest) = latest else {
            debug!(app = app_remote_id, "app has no versions");
            return Ok(VersionSnapshot {
                app,
                version: None,
                localizations: Vec::new(),
            });
        };

        let build = self.fetch_selected_build(token, &latest.id).await?;

        let endpoint = format!(
            "/appStoreVersions/{}/appStoreVersionLocalizations?limit=50",
            latest.id
        );
        let version_locs: Document<Vec<Resource<VersionLocalizationAttributes>>> =
            self.get(token, &endpoint).await?;
        let mut names = self.fetch_app_info_names(token, app_remote_id).await?;

        let mut localizations: Vec<RemoteLocalization> = version_locs
            .data
            .into_iter()
            .map(|loc| {
                let attrs = loc.attributes;
                let info = names.remove(&attrs.locale);
                RemoteLocalization {
                    title: info.as_ref().and_then(|i| i.name.clone()),
                    subtitle: info.and_then(|i| i.subtitle),
                    locale: attrs.locale,
                    description: attrs.description,
                    keywords: attrs.keywords,
                    whats_new: attrs.whats_new,
                    promotional_text: attrs.promotional_text,
                    marketing_url: attrs.marketing_url,
                    support_url: attrs.support_url,
                }
            })
            .collect();
        localizations.sort_by(|a, b| a.locale.cmp(&b.locale));

        Ok(VersionSnapshot {
            app,
            version: Some(latest.into_remote(build)),
            localizations,
        })
    }

    #[instrument(skip(self, token))]
    async fn create_version(
        &self,
        token: &BearerToken,
        app_remote_id: &str,
        version_string: &str,
        platform: Platform,
    ) -> Result<RemoteVersion> {
        validate_version_string(version_string)?;
        Self::require_apple_platform(platform)?;

        let body = serde_json::json!({
            "data": {
                "type": "appStoreVersions",
                "attributes": {
                    "platform": platform.as_str(),
                    "versionString": version_string.trim()
                },
                "relationships": {
                    "app": {
                        "data": { "type": "apps", "id": app_remote_id }
                    }
                }
            }
        });

        let response: Document<Resource<VersionAttributes>> = self
            .mutate(token, Method::POST, "/appStoreVersions", body)
            .await?;

        info!(version = version_string, id = %response.data.id, "created app store version");
        Ok(response.data.into_remote(None))
    }

    #[instrument(skip(self, token))]
    async fn list_builds_for_version(
        &self,
        token: &BearerToken,
        version_remote_id: &str,
    ) -> Result<Vec<RemoteBuild>> {
        let endpoint = format!("/appStoreVersions/{}", version_remote_id);
        let version: Document<Resource<VersionAttributes>> = self.get(token, &endpoint).await?;
        let app_id = self.fetch_version_app_id(token, version_remote_id).await?;

        let endpoint = format!(
            "/builds?filter[app]={}&filter[preReleaseVersion.version]={}&sort=-uploadedDate&limit=50",
            app_id, version.data.attributes.version_string
        );
        let builds: Document<Vec<Resource<BuildAttributes>>> = self.get(token, &endpoint).await?;

        Ok(builds.data.into_iter().map(|r| r.into_remote()).collect())
    }

    #[instrument(skip(self, token))]
    async fn select_build(
        &self,
        token: &BearerToken,
        version_remote_id: &str,
        build_remote_id: &str,
    ) -> Result<RemoteVersion> {
        let endpoint = format!("/builds/{}", build_remote_id);
        let build: Document<Resource<BuildAttributes>> = self.get(token, &endpoint).await?;
        let build = build.data.into_remote();
        if !build.is_ready() {
            return Err(StoreError::Conflict(format!(
                "Build {} is not ready (processing state {}, expired: {})",
                build_remote_id,
                build.processing_state.as_str(),
                build.expired
            )));
        }

        let body = serde_json::json!({
            "data": { "type": "builds", "id": build_remote_id }
        });
        let endpoint = format!("/appStoreVersions/{}/relationships/build", version_remote_id);
        self.mutate_no_content(token, Method::PATCH, &endpoint, body)
            .await?;

        info!(version = version_remote_id, build = build_remote_id, "attached build");
        self.fetch_version(token, version_remote_id).await
    }

    #[instrument(skip(self, token))]
    async fn submit_for_review(
        &self,
        token: &BearerToken,
        version_remote_id: &str,
        platform: Platform,
    ) -> Result<SubmissionAck> {
        Self::require_apple_platform(platform)?;
        let app_id = self.fetch_version_app_id(token, version_remote_id).await?;

        let reused = self.find_open_submission(token, &app_id, platform).await?;
        let submission_id = match &reused {
            Some(id) => {
                info!(submission = %id, "reusing open review submission");
                id.clone()
            }
            None => {
                let body = serde_json::json!({
                    "data": {
                        "type": "reviewSubmissions",
                        "attributes": { "platform": platform.as_str() },
                        "relationships": {
                            "app": { "data": { "type": "apps", "id": app_id } }
                        }
                    }
                });
                let submission: Document<Resource<ReviewSubmissionAttributes>> = self
                    .mutate(token, Method::POST, "/reviewSubmissions", body)
                    .await?;
                submission.data.id
            }
        };

        let body = serde_json::json!({
            "data": {
                "type": "reviewSubmissionItems",
                "relationships": {
                    "reviewSubmission": {
                        "data": { "type": "reviewSubmissions", "id": submission_id }
                    },
                    "appStoreVersion": {
                        "data": { "type": "appStoreVersions", "id": version_remote_id }
                    }
                }
            }
        });
        let added: Result<Document<ResourceId>> = self
            .mutate(token, Method::POST, "/reviewSubmissionItems", body)
            .await;
        match added {
            Ok(_) => {}
            // an earlier attempt may already have attached this version
            Err(StoreError::Conflict(message)) if reused.is_some() => {
                warn!(submission = %submission_id, "item not added: {}", message);
            }
            Err(err) => return Err(err),
        }

        let body = serde_json::json!({
            "data": {
                "type": "reviewSubmissions",
                "id": submission_id,
                "attributes": { "submitted": true }
            }
        });
        let endpoint = format!("/reviewSubmissions/{}", submission_id);
        let submitted: Document<Resource<ReviewSubmissionAttributes>> =
            self.mutate(token, Method::PATCH, &endpoint, body).await?;

        let accepted = !matches!(
            submitted.data.attributes.state.as_deref(),
            Some("UNRESOLVED_ISSUES" | "CANCELING")
        );
        info!(submission = %submission_id, accepted, "submitted version for review");

        Ok(SubmissionAck {
            submission_id,
            accepted,
        })
    }
}

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: T,
    #[serde(default)]
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Resource<A> {
    id: String,
    attributes: A,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    data: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppAttributes {
    name: String,
    bundle_id: String,
    primary_locale: Option<String>,
    sku: Option<String>,
}

impl Resource<AppAttributes> {
    fn into_remote(self) -> RemoteApp {
        RemoteApp {
            remote_id: self.id,
            name: self.attributes.name,
            bundle_id: self.attributes.bundle_id,
            primary_locale: self
                .attributes
                .primary_locale
                .unwrap_or_else(|| "en-US".to_string()),
            sku: self.attributes.sku,
            platform: Platform::Ios,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionAttributes {
    version_string: String,
    app_store_state: Option<String>,
    platform: Option<String>,
    created_date: Option<String>,
}

impl Resource<VersionAttributes> {
    fn into_remote(self, selected_build_id: Option<String>) -> RemoteVersion {
        let remote_state = self.attributes.app_store_state.unwrap_or_default();
        RemoteVersion {
            state: VersionState::from_remote(&remote_state, selected_build_id.is_some()),
            remote_state,
            remote_id: self.id,
            version_string: self.attributes.version_string,
            platform: self
                .attributes
                .platform
                .as_deref()
                .and_then(Platform::from_remote)
                .unwrap_or(Platform::Ios),
            created_at: parse_date(self.attributes.created_date),
            selected_build_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionLocalizationAttributes {
    locale: String,
    description: Option<String>,
    keywords: Option<String>,
    whats_new: Option<String>,
    promotional_text: Option<String>,
    marketing_url: Option<String>,
    support_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppInfoLocalizationAttributes {
    locale: String,
    name: Option<String>,
    subtitle: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildAttributes {
    version: String,
    uploaded_date: Option<String>,
    #[serde(default)]
    expired: bool,
    processing_state: Option<String>,
}

impl Resource<BuildAttributes> {
    fn into_remote(self) -> RemoteBuild {
        RemoteBuild {
            remote_id: self.id,
            build_number: self.attributes.version,
            processing_state: self
                .attributes
                .processing_state
                .as_deref()
                .map(BuildProcessingState::from_str)
                .unwrap_or(BuildProcessingState::Unknown),
            uploaded_at: parse_date(self.attributes.uploaded_date),
            expired: self.attributes.expired,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReviewSubmissionAttributes {
    state: Option<String>,
}
