//! Configuration validation

use tracing::debug;
use url::Url;

use launchpad_stores::apple::TOKEN_LIFETIME_SECS;

use crate::error::{ConfigError, Result};

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_api(config)?;
    validate_auth(config)?;
    validate_sync(config)?;
    validate_import(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

fn validate_api(config: &Config) -> Result<()> {
    let url = Url::parse(&config.api.base_url)
        .map_err(|e| invalid("api.base_url", format!("not a valid URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("api.base_url", "scheme must be http or https").into());
    }

    if config.api.request_timeout_secs == 0 {
        return Err(invalid("api.request_timeout_secs", "must be greater than zero").into());
    }

    if config.api.page_limit == 0 || config.api.page_limit > 200 {
        return Err(invalid("api.page_limit", "must be between 1 and 200").into());
    }

    Ok(())
}

fn validate_auth(config: &Config) -> Result<()> {
    if config.auth.audience.is_empty() {
        return Err(invalid("auth.audience", "audience cannot be empty").into());
    }

    if config.auth.token_ttl_secs == 0 || config.auth.token_ttl_secs > TOKEN_LIFETIME_SECS as u64 {
        return Err(invalid(
            "auth.token_ttl_secs",
            format!("must be between 1 and {}", TOKEN_LIFETIME_SECS),
        )
        .into());
    }

    if config.auth.refresh_margin_secs >= config.auth.token_ttl_secs {
        return Err(invalid("auth.refresh_margin_secs", "must be less than auth.token_ttl_secs").into());
    }

    Ok(())
}

fn validate_sync(config: &Config) -> Result<()> {
    if config.sync.remote_deadline_secs == 0 {
        return Err(invalid("sync.remote_deadline_secs", "must be greater than zero").into());
    }
    Ok(())
}

fn validate_import(config: &Config) -> Result<()> {
    if config.import.concurrency == 0 {
        return Err(invalid("import.concurrency", "must be at least 1").into());
    }

    if config.import.deadline_secs == 0 {
        return Err(invalid("import.deadline_secs", "must be greater than zero").into());
    }

    Ok(())
}
