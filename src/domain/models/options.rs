//! Per-task execution options.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key/value options handed to a single task execution.
///
/// Built fresh for every task from the shared base options plus any
/// overrides targeting that task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskOptions {
    values: BTreeMap<String, String>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Lookup ignoring ASCII case, for the reserved override keys.
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TaskOptions {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_ignore_case() {
        let options = TaskOptions::new().with("Status", "Warning");
        assert_eq!(options.get("status"), None);
        assert_eq!(options.get_ignore_case("status"), Some("Warning"));
    }

    #[test]
    fn test_insert_replaces_existing_value() {
        let mut options = TaskOptions::new().with("agentLanguage", "Java");
        options.insert("agentLanguage", "Go");
        assert_eq!(options.get("agentLanguage"), Some("Go"));
        assert_eq!(options.len(), 1);
    }
}
