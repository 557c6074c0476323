//! Configuration loading

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::defaults::config_file_names;
use super::types::Config;
use super::validation::validate_config;

/// Load configuration from a file
pub fn load_config(path: &Path) -> Result<Config> {
    let format = if path.extension().is_some_and(|e| e == "toml") {
        "TOML"
    } else {
        "YAML"
    };
    info!(path = %path.display(), format, "loading config");

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

    let config: Config = if format == "TOML" {
        toml::from_str(&content).map_err(ConfigError::TomlError)?
    } else {
        serde_yaml::from_str(&content).map_err(ConfigError::YamlError)?
    };

    validate_config(&config)?;
    debug!(path = %path.display(), "config loaded and validated");
    Ok(config)
}

/// Find configuration file in directory or parent directories.
///
/// The first match wins. Parents are walked until the filesystem root.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for config file");
    let mut current = start_dir.to_path_buf();

    loop {
        for name in config_file_names() {
            let config_path = current.join(name);
            if config_path.exists() {
                info!(path = %config_path.display(), "found config file");
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    debug!("no config file found");
    None
}

/// Load configuration from directory (searching parent directories)
pub fn load_config_from_dir(dir: &Path) -> Result<(Config, PathBuf)> {
    let config_path = find_config(dir).ok_or_else(|| ConfigError::NotFound(dir.to_path_buf()))?;

    let config = load_config(&config_path)?;
    Ok((config, config_path))
}

/// Load configuration or use defaults when no file exists
///
/// A file that exists but fails to parse or validate is an error.
pub fn load_config_or_default(dir: &Path) -> Result<(Config, Option<PathBuf>)> {
    match find_config(dir) {
        Some(path) => {
            let config = load_config(&path)?;
            Ok((config, Some(path)))
        }
        None => {
            debug!(dir = %dir.display(), "no config found, using defaults");
            Ok((Config::default(), None))
        }
    }
}

/// Where the state file lives for a loaded configuration
///
/// Relative storage paths resolve against the directory holding the config
/// file, or `base_dir` when running on defaults.
pub fn resolve_storage_path(config: &Config, config_path: Option<&Path>, base_dir: &Path) -> PathBuf {
    if config.storage.path.is_absolute() {
        return config.storage.path.clone();
    }
    let root = config_path
        .and_then(|p| p.parent())
        .unwrap_or(base_dir);
    root.join(&config.storage.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::LockPolicy;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_toml() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("launchpad.toml");
        std::fs::write(&config_path, "[sync]\nlock_policy = \"wait\"").unwrap();

        let found = find_config(temp.path());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_prefers_toml_over_yaml() {
        let temp = TempDir::new().unwrap();
        let toml_path = temp.path().join("launchpad.toml");
        let yaml_path = temp.path().join("launchpad.yaml");
        std::fs::write(&toml_path, "[sync]\nlock_policy = \"wait\"").unwrap();
        std::fs::write(&yaml_path, "sync:\n  lock_policy: reject").unwrap();

        let found = find_config(temp.path()).unwrap();
        assert_eq!(found, toml_path);
    }

    #[test]
    fn test_find_config_walks_up() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("apps").join("ios");
        std::fs::create_dir_all(&nested).unwrap();
        let config_path = temp.path().join(".launchpad.yaml");
        std::fs::write(&config_path, "import:\n  concurrency: 2\n").unwrap();

        let found = find_config(&nested).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_load_config_yaml() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("launchpad.yaml");
        std::fs::write(
            &config_path,
            "sync:\n  lock_policy: reject\nimport:\n  concurrency: 8\n",
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.sync.lock_policy, LockPolicy::Reject);
        assert_eq!(config.import.concurrency, 8);
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("launchpad.toml");
        std::fs::write(&config_path, "[import]\nconcurrency = 0\n").unwrap();

        assert!(load_config(&config_path).is_err());
        assert!(load_config_or_default(temp.path()).is_err());
    }

    #[test]
    fn test_storage_path_resolves_against_config_dir() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("launchpad.toml");
        std::fs::write(&config_path, "").unwrap();

        let (config, found) = load_config_or_default(temp.path()).unwrap();
        let resolved = resolve_storage_path(&config, found.as_deref(), Path::new("/elsewhere"));
        assert_eq!(resolved, temp.path().join(".launchpad/state.json"));
    }
}
