//! The contract every diagnostic check implements.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::models::{Identifier, TaskOptions, TaskResult};

/// Results of a task's declared dependencies, keyed by identifier string.
pub type UpstreamResults = HashMap<String, TaskResult>;

/// A single diagnostic check.
///
/// Checks are executed one at a time, in dependency order. A check reports
/// problems through the status of its [`TaskResult`]; it never fails the run.
#[async_trait]
pub trait Task: Send + Sync {
    /// Stable `Category/Subcategory/Name` identity.
    fn identifier(&self) -> Identifier;

    /// One-line description shown by `nrdiag list`.
    fn explain(&self) -> String;

    /// Identifier strings of the checks whose results this one consumes.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Inspect the environment and return a verdict.
    ///
    /// `upstream` holds exactly the results of [`dependencies`](Self::dependencies).
    async fn execute(&self, options: &TaskOptions, upstream: &UpstreamResults) -> TaskResult;
}
