//! nrdiag - diagnostic collection pipeline
//!
//! Runs an ordered queue of diagnostic checks, prints their results as they
//! finish, collects the evidence files they point at into a zip archive, and
//! writes a JSON report of every result.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): identifiers, statuses, results, the `Task` port
//! - **Service Layer** (`services`): orchestrator, consumers, archive and report
//! - **Application Layer** (`application`): wires one run end to end
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **Tasks** (`tasks`): the built-in checks
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use nrdiag::{tasks, Config, DiagnosticRun};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let queue = tasks::registry()?.resolve(&[])?;
//!     let outcome = DiagnosticRun::new(Config::default(), queue)
//!         .execute(std::io::stdout())
//!         .await?;
//!     println!("{:?}", outcome.finalized.archive_path);
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
pub mod tasks;

pub use application::{DiagnosticRun, RunOutcome};
pub use domain::models::{
    Config, FileCopyEnvelope, Identifier, LoggingConfig, Status, TaskOptions, TaskResult,
};
pub use domain::ports::{Task, UpstreamResults};
pub use domain::{DiagError, DiagResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Orchestrator, OverrideEngine, TaskQueue, TaskRegistry};
