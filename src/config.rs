//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ClientError;

/// Default query endpoint of the Sage data API
pub const DEFAULT_ENDPOINT: &str = "https://data.sagecontinuum.org/api/v1/query";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query client configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout() -> u64 {
    300 // large ranges can take minutes to stream
}

fn default_user_agent() -> String {
    concat!("sage-data-client/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {:?}: {}", path, e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("failed to parse {:?}: {}", path, e)))
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ClientError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Config file locations, in search order
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sage-data").join("config.toml"));
        }
        paths.push(PathBuf::from("./sage-data.toml"));
        paths
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("SAGE_DATA_ENDPOINT") {
            self.client.endpoint = endpoint;
        }
        if let Ok(timeout) = std::env::var("SAGE_DATA_TIMEOUT_SECS") {
            match timeout.parse() {
                Ok(secs) => self.client.timeout_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid SAGE_DATA_TIMEOUT_SECS: {}", timeout),
            }
        }

        if let Ok(level) = std::env::var("SAGE_DATA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SAGE_DATA_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Generate a default configuration file content
pub fn generate_default_config() -> String {
    format!(
        r#"# Sage data client configuration

[client]
# Query API endpoint
endpoint = "{}"

# Request timeout (seconds), covering connect and the streamed response
timeout_secs = 300

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for terminals) or json (for log collectors)
format = "pretty"
"#,
        DEFAULT_ENDPOINT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.client.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.client.timeout_secs, 300);
        assert!(config.client.user_agent.starts_with("sage-data-client/"));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.client, defaults.client);
        assert_eq!(config.logging, defaults.logging);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[client]\nendpoint = \"http://localhost:8080/query\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.client.endpoint, "http://localhost:8080/query");
        assert_eq!(config.client.timeout_secs, 300);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[client\nendpoint = ").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
