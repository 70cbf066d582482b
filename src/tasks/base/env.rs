//! `Base/Env/*` checks.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::models::{
    ContentStream, FileCopyEnvelope, Identifier, Status, TaskOptions, TaskResult,
};
use crate::domain::ports::{Task, UpstreamResults};

/// Stream name of the collected variables.
pub const ENV_VARS_FILE: &str = "nrdiag-env-vars.txt";

/// Variable name fragments whose values are never written out.
const SECRET_MARKERS: [&str; 5] = ["LICENSE", "KEY", "TOKEN", "PASSWORD", "SECRET"];

/// Variables collected regardless of prefix.
const WELL_KNOWN: [&str; 7] = [
    "PATH",
    "HOME",
    "JAVA_HOME",
    "PYTHONPATH",
    "NODE_PATH",
    "DOTNET_ROOT",
    "SHELL",
];

/// Collects the environment variables relevant to agent behavior.
#[derive(Debug, Default)]
pub struct CollectEnvVars;

impl CollectEnvVars {
    fn is_relevant(name: &str) -> bool {
        let upper = name.to_uppercase();
        upper.starts_with("NEW_RELIC")
            || upper.starts_with("NEWRELIC")
            || upper.starts_with("NRIA_")
            || WELL_KNOWN.contains(&upper.as_str())
    }

    fn redact(name: &str, value: String) -> String {
        let upper = name.to_uppercase();
        if SECRET_MARKERS.iter().any(|marker| upper.contains(marker)) {
            "********".to_string()
        } else {
            value
        }
    }

    /// Filter and redact a set of variables.
    pub fn collect<I>(vars: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter(|(name, _)| Self::is_relevant(name))
            .map(|(name, value)| {
                let value = Self::redact(&name, value);
                (name, value)
            })
            .collect()
    }
}

#[async_trait]
impl Task for CollectEnvVars {
    fn identifier(&self) -> Identifier {
        Identifier::new("Base", "Env", "CollectEnvVars")
    }

    fn explain(&self) -> String {
        "Collect agent-related environment variables of the current shell".to_string()
    }

    async fn execute(&self, _options: &TaskOptions, _upstream: &UpstreamResults) -> TaskResult {
        let vars = Self::collect(std::env::vars());
        let lines: Vec<String> = vars
            .iter()
            .map(|(name, value)| format!("{name}={value}\n"))
            .collect();

        TaskResult::new(
            Status::Info,
            format!("Gathered {} environment variables of the current shell.", vars.len()),
        )
        .with_payload(&vars)
        .with_files(vec![FileCopyEnvelope::from_stream(
            ENV_VARS_FILE,
            ContentStream::from_chunks(lines),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn test_collect_filters_and_redacts() {
        let vars = CollectEnvVars::collect(vec![
            pair("NEW_RELIC_APP_NAME", "checkout"),
            pair("NEW_RELIC_LICENSE_KEY", "abc123"),
            pair("JAVA_HOME", "/usr/lib/jvm"),
            pair("AWS_REGION", "us-east-1"),
        ]);

        assert_eq!(vars.len(), 3);
        assert_eq!(vars["NEW_RELIC_APP_NAME"], "checkout");
        assert_eq!(vars["NEW_RELIC_LICENSE_KEY"], "********");
        assert!(!vars.contains_key("AWS_REGION"));
    }

    #[tokio::test]
    async fn test_execute_streams_variables() {
        let result = CollectEnvVars
            .execute(&TaskOptions::new(), &UpstreamResults::new())
            .await;
        assert_eq!(result.status, Status::Info);
        assert_eq!(result.files_to_copy.len(), 1);
        assert!(result.files_to_copy[0].is_streamed());
        assert_eq!(result.files_to_copy[0].file_name(), ENV_VARS_FILE);
    }
}
