use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure for a diagnostics run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Directory that receives the report, manifest and archive
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Comma-separated status names to print live, or `all`
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Raw `Identifier.key=value` override list
    #[serde(default)]
    pub overrides: String,

    /// Extra file or directory folded into the archive under `Include/`
    #[serde(default)]
    pub include: Option<PathBuf>,

    /// Size cap for the include path, in bytes
    #[serde(default = "default_include_limit_bytes")]
    pub include_limit_bytes: u64,

    /// Capacity of the result and file queues
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Identifier patterns to run; empty runs every registered task
    #[serde(default)]
    pub tasks: Vec<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_output_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_filter() -> String {
    "success,warning,failure,error,info".to_string()
}

const fn default_include_limit_bytes() -> u64 {
    4 * 1024 * 1024 * 1024
}

const fn default_channel_capacity() -> usize {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            filter: default_filter(),
            overrides: String::new(),
            include: None,
            include_limit_bytes: default_include_limit_bytes(),
            channel_capacity: default_channel_capacity(),
            tasks: vec![],
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for an additional JSON log file
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
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
            log_dir: None,
        }
    }
}
