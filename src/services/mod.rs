//! Service layer: the run pipeline.
//!
//! Orchestrator -> {result stream, file stream} -> {result consumer, file consumer} -> finalizer

pub mod archive;
pub mod file_consumer;
pub mod finalizer;
pub mod manifest;
pub mod orchestrator;
pub mod override_engine;
pub mod report;
pub mod result_consumer;
pub mod task_queue;

pub use archive::Archive;
pub use file_consumer::{AcceptedFile, CollectedFiles, FileConsumer, NameDeduplicator, StoredFile};
pub use finalizer::{finalize, FinalizedRun};
pub use manifest::Manifest;
pub use orchestrator::{Orchestrator, TaskRun};
pub use override_engine::{parse_overrides, Override, OverrideEngine};
pub use report::Report;
pub use result_consumer::{CollectedResults, ResultConsumer, StatusFilter};
pub use task_queue::{TaskQueue, TaskRegistry};
