//! Default configuration values

use super::types::Config;

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "launchpad.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "launchpad.yaml";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        DEFAULT_CONFIG_YAML,
        ".launchpad.toml",
        ".launchpad.yaml",
    ]
}

/// Render the default configuration as TOML
pub fn default_config_toml() -> String {
    toml::to_string_pretty(&Config::default()).unwrap_or_else(|_| DEFAULT_CONFIG_TEMPLATE.to_string())
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Launchpad Configuration

[api]
base_url = "https://api.appstoreconnect.apple.com/v1"
request_timeout_secs = 30
max_retries = 3
retry_delay_ms = 1000
page_limit = 200

[auth]
audience = "appstoreconnect-v1"
token_ttl_secs = 1200
refresh_margin_secs = 60

[sync]
lock_policy = "wait"
remote_deadline_secs = 60

[import]
deadline_secs = 600
concurrency = 4

[storage]
path = ".launchpad/state.json"
"#;
