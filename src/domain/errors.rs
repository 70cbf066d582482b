//! Domain errors for the diagnostics run.

use std::path::PathBuf;

use thiserror::Error;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Errors raised by the orchestration and archiving pipeline.
///
/// Individual check failures are never errors: they travel as a
/// [`Status`](crate::domain::models::Status) inside a normal result.
#[derive(Debug, Error)]
pub enum DiagError {
    #[error("Invalid task identifier '{0}': expected Category/Subcategory/Name")]
    InvalidIdentifier(String),

    #[error("Invalid status filter '{0}': expected a comma-separated list of status names or 'all'")]
    InvalidFilter(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Task {0} is registered more than once")]
    DuplicateTask(String),

    #[error("Task {task} depends on {dependency}, which is not queued before it")]
    DependencyOrder { task: String, dependency: String },

    #[error("Task dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<String>),

    #[error("No result available for {dependency}, required by {task}")]
    MissingUpstreamResult { task: String, dependency: String },

    #[error("Could not find a free archive name for {path} after {attempts} attempts")]
    NameCollisionExhausted { path: String, attempts: u32 },

    #[error("Include path {path} is {size} bytes, over the {limit} byte limit")]
    IncludeTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Pipeline stage failed: {0}")]
    PipelineFailed(String),
}

pub type DiagResult<T> = Result<T, DiagError>;

impl DiagError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<zip::result::ZipError> for DiagError {
    fn from(err: zip::result::ZipError) -> Self {
        DiagError::Archive(err.to_string())
    }
}

impl From<serde_json::Error> for DiagError {
    fn from(err: serde_json::Error) -> Self {
        DiagError::SerializationError(err.to_string())
    }
}
