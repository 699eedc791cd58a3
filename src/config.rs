// Configuration File Support
//
// This module provides configuration file parsing for the OmniProspect quota engine.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from XDG config directory: ~/.config/omniprospect/quota.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::rate_limit::config::{default_policies, PolicyConfig, QuotaPolicyRegistry};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Platform policies keyed by platform name
    pub policies: BTreeMap<String, PolicySettings>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Policy entry as written in the config file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicySettings {
    /// Window length in seconds
    pub window_secs: u64,

    /// Requests admitted per window
    pub max_requests: u64,
}

impl Default for Config {
    fn default() -> Self {
        let policies = default_policies()
            .into_iter()
            .map(|p| {
                (
                    p.platform,
                    PolicySettings {
                        window_secs: p.window_secs,
                        max_requests: p.max_requests,
                    },
                )
            })
            .collect();

        Self {
            logging: LoggingConfig::default(),
            policies,
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or if
    /// the configuration fails validation. If the config file does not exist,
    /// returns the default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or if
    /// the resulting configuration fails validation. A missing file yields the
    /// default configuration with environment overrides applied.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            let config = Self::default().apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file from {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file from {:?}", path))?;

        let config = config.apply_env_overrides();
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/omniprospect/quota.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "omniprospect", "OmniProspect") {
            proj_dirs.config_dir().join("quota.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config").join("omniprospect").join("quota.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// - OMNIPROSPECT_LOG_LEVEL
    /// - OMNIPROSPECT_LOG_FORMAT
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("OMNIPROSPECT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("OMNIPROSPECT_LOG_FORMAT") {
            self.logging.format = format;
        }
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}. Must be one of: trace, debug, info, warn, error", self.logging.level),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!("Invalid log format: {}. Must be one of: json, pretty, compact", self.logging.format),
        }

        if self.policies.is_empty() {
            anyhow::bail!("At least one platform policy must be configured");
        }

        self.registry().map(|_| ())
    }

    /// Platform policies as engine types
    pub fn policy_configs(&self) -> Vec<PolicyConfig> {
        self.policies
            .iter()
            .map(|(platform, s)| PolicyConfig::new(platform.clone(), s.window_secs, s.max_requests))
            .collect()
    }

    /// Build the policy registry for the limiter
    pub fn registry(&self) -> Result<QuotaPolicyRegistry> {
        QuotaPolicyRegistry::new(self.policy_configs()).context("Invalid quota policy configuration")
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging.level.to_lowercase().parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::NamedTempFile;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear_env() {
        std::env::remove_var("OMNIPROSPECT_LOG_LEVEL");
        std::env::remove_var("OMNIPROSPECT_LOG_FORMAT");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.policies.len(), 4);
        assert_eq!(config.policies["linkedin"].max_requests, 100);
        assert_eq!(config.policies["yahoo"].window_secs, 60);
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_max_requests() {
        let mut config = Config::default();
        config.policies.insert(
            "google".to_string(),
            PolicySettings { window_secs: 60, max_requests: 0 },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_no_policies() {
        let mut config = Config::default();
        config.policies.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_registry_from_config() {
        let registry = Config::default().registry().unwrap();
        assert_eq!(registry.platforms(), vec!["bing", "google", "linkedin", "yahoo"]);
        assert_eq!(registry.lookup("bing").unwrap().window_secs, 30 * 24 * 3600);
    }

    #[test]
    fn test_env_override_validated_without_config_file() {
        let _guard = env_guard();
        clear_env();
        std::env::set_var("OMNIPROSPECT_LOG_FORMAT", "xml");

        let dir = tempfile::TempDir::new().unwrap();
        let result = Config::load_from_path(dir.path().join("missing.toml"));
        clear_env();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("Invalid log format: xml"));
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let _guard = env_guard();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.policies, Config::default().policies);
    }

    #[test]
    fn test_load_valid_toml_config() {
        let _guard = env_guard();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[policies.linkedin]
window_secs = 86400
max_requests = 50

[policies.duckduckgo]
window_secs = 3600
max_requests = 200
"#;

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.policies.len(), 2);
        assert_eq!(config.policies["linkedin"].max_requests, 50);
        assert_eq!(config.policies["duckduckgo"].window_secs, 3600);

        let registry = config.registry().unwrap();
        assert!(registry.lookup("google").is_err());
    }

    #[test]
    fn test_config_partial_toml() {
        let _guard = env_guard();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "warn");
        // policies fall back to the defaults
        assert_eq!(config.policies.len(), 4);
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[logging\nlevel = \"debug\"\n").unwrap();

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_policy() {
        let _guard = env_guard();
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[policies.google]
window_secs = 0
max_requests = 10
"#;
        fs::write(temp_file.path(), toml_content).unwrap();

        let err = Config::load_from_path(temp_file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("window_secs must be > 0"));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = env_guard();
        clear_env();
        std::env::set_var("OMNIPROSPECT_LOG_LEVEL", "trace");
        std::env::set_var("OMNIPROSPECT_LOG_FORMAT", "pretty");

        let config = Config::default().apply_env_overrides();
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.logging.format, "pretty");

        clear_env();
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.ends_with("quota.toml"));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "invalid".to_string();
        assert!(config.log_level().is_err());
    }
}
