use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::Serialize;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::services::StatusFilter;

/// Project config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "nrdiag.yaml";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Output path cannot be empty")]
    EmptyOutputPath,

    #[error("Invalid channel_capacity: {0}. Must be at least 1")]
    InvalidChannelCapacity(usize),

    #[error("Invalid include_limit_bytes: {0}. Must be at least 1")]
    InvalidIncludeLimit(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `nrdiag.yaml` in the working directory, or `config_file` when given
    /// 3. Environment variables (NRDIAG_* prefix, `__` separates nested keys)
    /// 4. `cli`, the values set on the command line
    pub fn load<T: Serialize>(config_file: Option<&Path>, cli: &T) -> Result<Config> {
        let file = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed("NRDIAG_").split("__"))
            .merge(Serialized::defaults(cli))
            .extract()
            .context(format!("Failed to load configuration from {}", file.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without environment or CLI layers
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.output_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyOutputPath);
        }

        if config.channel_capacity == 0 {
            return Err(ConfigError::InvalidChannelCapacity(config.channel_capacity));
        }

        if config.include_limit_bytes == 0 {
            return Err(ConfigError::InvalidIncludeLimit(config.include_limit_bytes));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        StatusFilter::parse(&config.filter)
            .map_err(|e| ConfigError::InvalidFilter(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn no_cli() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output_path, PathBuf::from("."));
        assert_eq!(config.channel_capacity, 50);
        assert_eq!(config.include_limit_bytes, 4 * 1024 * 1024 * 1024);
        assert_eq!(config.logging.level, "warn");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
output_path: /tmp/nrdiag
filter: failure,error
overrides: Base/Config/Validate.Status=Warning
channel_capacity: 8
tasks:
  - Base/*
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.output_path, PathBuf::from("/tmp/nrdiag"));
        assert_eq!(config.filter, "failure,error");
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.tasks, vec!["Base/*".to_string()]);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.include, None);
        ConfigLoader::validate(&config).unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nrdiag.yaml");
        std::fs::write(&path, "filter: all\ninclude: /var/log/app\n").unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.filter, "all");
        assert_eq!(config.include, Some(PathBuf::from("/var/log/app")));
        assert_eq!(config.channel_capacity, 50);
    }

    #[test]
    fn test_env_overrides_file_and_cli_overrides_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nrdiag.yaml");
        std::fs::write(&path, "filter: success\nchannel_capacity: 4\n").unwrap();

        temp_env::with_vars(
            [
                ("NRDIAG_FILTER", Some("failure")),
                ("NRDIAG_LOGGING__LEVEL", Some("info")),
            ],
            || {
                let config = ConfigLoader::load(Some(&path), &no_cli()).unwrap();
                assert_eq!(config.filter, "failure");
                assert_eq!(config.logging.level, "info");
                assert_eq!(config.channel_capacity, 4);

                let mut cli = no_cli();
                cli.insert("filter".to_string(), "all".to_string());
                let config = ConfigLoader::load(Some(&path), &cli).unwrap();
                assert_eq!(config.filter, "all");
            },
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.channel_capacity = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidChannelCapacity(0))
        ));

        let mut config = Config::default();
        config.filter = "sometimes".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidFilter(_))
        ));

        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));

        let mut config = Config::default();
        config.output_path = PathBuf::new();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyOutputPath)
        ));
    }
}
