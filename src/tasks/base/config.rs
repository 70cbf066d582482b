//! `Base/Config/*` checks: find agent configuration files and validate them.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::domain::models::{FileCopyEnvelope, Identifier, Status, TaskOptions, TaskResult};
use crate::domain::ports::{Task, UpstreamResults};

/// Option naming the directory to search; defaults to the working directory.
pub const CONFIG_PATH_OPTION: &str = "configPath";
/// Option limiting how deep the search descends.
pub const SEARCH_DEPTH_OPTION: &str = "searchDepth";

const DEFAULT_SEARCH_DEPTH: usize = 3;

const CONFIG_FILE_NAMES: [&str; 7] = [
    "newrelic.yml",
    "newrelic.yaml",
    "newrelic.ini",
    "newrelic.config",
    "newrelic.js",
    "newrelic.xml",
    "newrelic-infra.yml",
];

const CONFIG_DOCS_URL: &str =
    "https://docs.newrelic.com/docs/apm/agents/manage-apm-agents/configuration/";

/// Locates agent configuration files.
#[derive(Debug, Default)]
pub struct CollectConfig;

impl CollectConfig {
    pub fn find(root: &Path, depth: usize) -> Vec<PathBuf> {
        WalkDir::new(root)
            .max_depth(depth)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy().to_lowercase();
                CONFIG_FILE_NAMES.contains(&name.as_str())
            })
            .map(|entry| entry.into_path())
            .collect()
    }
}

#[async_trait]
impl Task for CollectConfig {
    fn identifier(&self) -> Identifier {
        Identifier::new("Base", "Config", "Collect")
    }

    fn explain(&self) -> String {
        "Search for New Relic agent configuration files".to_string()
    }

    async fn execute(&self, options: &TaskOptions, _upstream: &UpstreamResults) -> TaskResult {
        let root = options
            .get(CONFIG_PATH_OPTION)
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let depth = options
            .get(SEARCH_DEPTH_OPTION)
            .and_then(|d| d.parse().ok())
            .unwrap_or(DEFAULT_SEARCH_DEPTH);

        let found = Self::find(&root, depth);
        debug!(root = %root.display(), found = found.len(), "configuration search finished");

        if found.is_empty() {
            return TaskResult::new(
                Status::Warning,
                format!(
                    "No New Relic configuration files found under {}",
                    root.display()
                ),
            )
            .with_url(CONFIG_DOCS_URL);
        }

        let files = found.iter().map(FileCopyEnvelope::from_disk).collect();
        TaskResult::new(
            Status::Success,
            format!("Found {} configuration file(s)", found.len()),
        )
        .with_payload(&found)
        .with_files(files)
    }
}

/// Outcome of validating one configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedConfig {
    pub path: PathBuf,
    pub valid: bool,
    pub problem: Option<String>,
}

/// Checks that each collected configuration file is readable and parses.
#[derive(Debug, Default)]
pub struct ValidateConfig;

impl ValidateConfig {
    pub fn validate(path: &Path) -> ValidatedConfig {
        let problem = match fs::read_to_string(path) {
            Err(err) => Some(format!("unreadable: {err}")),
            Ok(contents) if contents.trim().is_empty() => Some("file is empty".to_string()),
            Ok(contents) if is_yaml(path) => serde_yaml::from_str::<serde_yaml::Value>(&contents)
                .err()
                .map(|err| format!("invalid YAML: {err}")),
            Ok(_) => None,
        };

        ValidatedConfig {
            path: path.to_path_buf(),
            valid: problem.is_none(),
            problem,
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
        .unwrap_or(false)
}

#[async_trait]
impl Task for ValidateConfig {
    fn identifier(&self) -> Identifier {
        Identifier::new("Base", "Config", "Validate")
    }

    fn explain(&self) -> String {
        "Validate the syntax of collected New Relic configuration files".to_string()
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["Base/Config/Collect".to_string()]
    }

    async fn execute(&self, _options: &TaskOptions, upstream: &UpstreamResults) -> TaskResult {
        let found: Vec<PathBuf> = upstream
            .get("Base/Config/Collect")
            .and_then(|result| result.payload_as())
            .unwrap_or_default();

        if found.is_empty() {
            return TaskResult::new(Status::None, "No configuration files to validate");
        }

        let validated: Vec<ValidatedConfig> = found.iter().map(|p| Self::validate(p)).collect();
        let invalid: Vec<String> = validated
            .iter()
            .filter(|v| !v.valid)
            .map(|v| {
                format!(
                    "{}: {}",
                    v.path.display(),
                    v.problem.as_deref().unwrap_or("invalid")
                )
            })
            .collect();

        let result = if invalid.is_empty() {
            TaskResult::new(
                Status::Success,
                format!("{} configuration file(s) parsed successfully", validated.len()),
            )
        } else {
            TaskResult::new(
                Status::Failure,
                format!("Invalid configuration files:\n{}", invalid.join("\n")),
            )
            .with_url(CONFIG_DOCS_URL)
        };
        result.with_payload(&validated)
    }
}
