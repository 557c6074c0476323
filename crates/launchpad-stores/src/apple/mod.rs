//! Apple App Store Connect support
//!
//! - [`TokenIssuer`]: ES256 bearer tokens, cached per tenant
//! - [`AppStoreConnect`]: typed client for apps, versions, builds and review
//!   submissions
//!
//! ```ignore
//! use launchpad_stores::apple::{AppStoreConnect, ConnectConfig, TokenIssuer};
//!
//! let issuer = TokenIssuer::new("appstoreconnect-v1");
//! let client = AppStoreConnect::new(ConnectConfig::default())?;
//! let token = issuer.token("tenant-1", &credential)?;
//! let apps = client.list_apps(&token).await?;
//! ```

mod connect;
pub mod errors;
mod token;

pub use connect::{AppStoreConnect, ConnectConfig, API_BASE_URL};
pub use token::{
    BearerToken, Clock, Es256Signer, TokenIssuer, TokenPolicy, TokenSigner, DEFAULT_AUDIENCE,
    REFRESH_MARGIN_SECS, TOKEN_LIFETIME_SECS,
};

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Result, StoreError};

/// Pattern App Store Connect accepts for `versionString`
const VERSION_STRING_PATTERN: &str = r"^\d+(\.\d+){0,2}$";

/// Check a version string before it is sent anywhere
pub fn validate_version_string(version_string: &str) -> Result<()> {
    let trimmed = version_string.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation("version string cannot be empty".to_string()));
    }

    if !version_pattern()?.is_match(trimmed) {
        return Err(StoreError::Validation(format!(
            "'{}' is not a valid version string (expected e.g. 1.2 or 1.2.3)",
            version_string
        )));
    }

    Ok(())
}

fn version_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(pattern) = PATTERN.get() {
        return Ok(pattern);
    }
    let compiled = Regex::new(VERSION_STRING_PATTERN)
        .map_err(|e| StoreError::Validation(format!("invalid version pattern: {}", e)))?;
    Ok(PATTERN.get_or_init(|| compiled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_version_string() {
        assert!(validate_version_string("1").is_ok());
        assert!(validate_version_string("1.2").is_ok());
        assert!(validate_version_string("10.20.30").is_ok());

        assert!(validate_version_string("").is_err());
        assert!(validate_version_string("   ").is_err());
        assert!(validate_version_string("1.2.3.4").is_err());
        assert!(validate_version_string("v1.2").is_err());
        assert!(validate_version_string("1.2-beta").is_err());
    }

    #[test]
    fn test_version_pattern_compiled_once() {
        let first = version_pattern().unwrap();
        let second = version_pattern().unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(first.is_match("3.4.5"));
    }
}
