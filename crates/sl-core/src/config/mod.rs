//! Configuration management for swarmlink

mod backoff;
mod node;
pub mod serde_utils;

pub use backoff::{BackoffConfig, BackoffPolicy};
pub use node::{default_discovery_port, NodeConfig, DEFAULT_DISCOVERY_PORT};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("swarmlink")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("node.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");
        let result = load_config::<NodeConfig>(&path);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_partial_config_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(
            &path,
            r#"
url = "https://ci.example.com/"
labels = ["linux", "docker"]
retry = 5

[backoff]
policy = "exponential"
interval = 2
"#,
        )
        .unwrap();

        let config: NodeConfig = load_config(&path).unwrap();
        assert_eq!(config.url.as_deref(), Some("https://ci.example.com/"));
        assert_eq!(config.labels, vec!["linux", "docker"]);
        assert_eq!(config.retry_budget(), Some(5));
        assert_eq!(config.backoff.policy, BackoffPolicy::Exponential);
        assert_eq!(config.backoff.interval.as_secs(), 2);
        assert_eq!(config.backoff.max_interval.as_secs(), 60);
        assert_eq!(config.discovery_address, "255.255.255.255");
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "retry = \"often\"").unwrap();
        let result = load_config::<NodeConfig>(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
