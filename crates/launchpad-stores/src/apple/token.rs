//! Short-lived bearer tokens for the App Store Connect API
//!
//! Tokens are ES256-signed JWTs valid for 20 minutes. [`TokenIssuer`] keeps
//! one token per tenant and hands it out until shortly before it expires.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::types::StoreCredential;

/// Audience claim expected by App Store Connect
pub const DEFAULT_AUDIENCE: &str = "appstoreconnect-v1";

/// Token lifetime; the API rejects anything longer
pub const TOKEN_LIFETIME_SECS: i64 = 20 * 60;

/// Cached tokens are replaced this long before they expire
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// JWT claims for App Store Connect API
#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: String,
    iat: i64,
    exp: i64,
    aud: &'a str,
}

/// Signed bearer credential presented on every API call
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    value: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl BearerToken {
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            issued_at,
            expires_at,
        }
    }

    /// Raw token value
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// `Authorization` header value
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Turns signing material into a token string
pub trait TokenSigner: Send + Sync {
    fn sign(
        &self,
        credential: &StoreCredential,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String>;
}

/// ES256 JWT signer
#[derive(Debug, Clone)]
pub struct Es256Signer {
    audience: String,
}

impl Es256Signer {
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
        }
    }
}

impl Default for Es256Signer {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIENCE)
    }
}

impl TokenSigner for Es256Signer {
    fn sign(
        &self,
        credential: &StoreCredential,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        let claims = Claims {
            iss: credential.issuer_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            aud: &self.audience,
        };

        let encoding_key = EncodingKey::from_ec_pem(credential.private_key.as_bytes())
            .map_err(|e| StoreError::Auth(format!("Invalid API key: {}", e)))?;

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(credential.key_id.clone());

        Ok(encode(&header, &claims, &encoding_key)?)
    }
}

/// Token lifetime settings
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub lifetime: Duration,
    pub refresh_margin: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            lifetime: Duration::seconds(TOKEN_LIFETIME_SECS),
            refresh_margin: Duration::seconds(REFRESH_MARGIN_SECS),
        }
    }
}

/// Issues and caches bearer tokens per tenant
pub struct TokenIssuer {
    signer: Arc<dyn TokenSigner>,
    policy: TokenPolicy,
    clock: Clock,
    cache: RwLock<HashMap<String, BearerToken>>,
}

impl TokenIssuer {
    /// Create an issuer signing ES256 tokens for `audience`
    pub fn new(audience: impl Into<String>) -> Self {
        Self::with_signer(Arc::new(Es256Signer::new(audience)))
    }

    pub fn with_signer(signer: Arc<dyn TokenSigner>) -> Self {
        Self {
            signer,
            policy: TokenPolicy::default(),
            clock: Arc::new(Utc::now),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: TokenPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sign a fresh token, bypassing the cache
    pub fn issue(&self, credential: &StoreCredential) -> Result<BearerToken> {
        if credential.key_id.len() != 10 || !credential.key_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StoreError::Auth(format!(
                "Malformed key ID '{}': expected 10 alphanumeric characters",
                credential.key_id
            )));
        }

        let issued_at = (self.clock)();
        let expires_at = issued_at + self.policy.lifetime;
        let value = self.signer.sign(credential, issued_at, expires_at)?;

        debug!(key_id = %credential.key_id, expires_at = %expires_at, "issued bearer token");
        Ok(BearerToken::new(value, issued_at, expires_at))
    }

    /// Cached token for `tenant_id`, re-issued once it is within the refresh margin
    pub fn token(&self, tenant_id: &str, credential: &StoreCredential) -> Result<BearerToken> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(token) = cache.get(tenant_id) {
                if self.is_fresh(token) {
                    return Ok(token.clone());
                }
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        // another caller may have refreshed while we waited for the write lock
        if let Some(token) = cache.get(tenant_id) {
            if self.is_fresh(token) {
                return Ok(token.clone());
            }
        }

        let token = self.issue(credential)?;
        cache.insert(tenant_id.to_string(), token.clone());
        Ok(token)
    }

    /// Drop the cached token for `tenant_id` (e.g. after key rotation)
    pub fn invalidate(&self, tenant_id: &str) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        if cache.remove(tenant_id).is_some() {
            debug!(tenant = tenant_id, "invalidated cached bearer token");
        }
    }

    fn is_fresh(&self, token: &BearerToken) -> bool {
        (self.clock)() < token.expires_at - self.policy.refresh_margin
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
