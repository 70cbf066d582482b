//! Run coordinator.
//!
//! Wires the orchestrator to both consumers over bounded channels, waits for
//! both consumers to drain, then finalizes the report and archive.

use std::fs;
use std::io::Write;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::domain::errors::{DiagError, DiagResult};
use crate::domain::models::{Config, TaskOptions};
use crate::services::archive::{Archive, ARCHIVE_FILE_NAME};
use crate::services::finalizer::{finalize, FinalizedRun};
use crate::services::manifest::{Manifest, MANIFEST_FILE_NAME};
use crate::services::{
    CollectedResults, FileConsumer, Orchestrator, OverrideEngine, ResultConsumer, StatusFilter,
    TaskQueue,
};

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub results: CollectedResults,
    pub files_stored: usize,
    pub files_failed: usize,
    pub finalized: FinalizedRun,
}

/// One diagnostics run over a resolved queue.
pub struct DiagnosticRun {
    config: Config,
    queue: TaskQueue,
    base_options: TaskOptions,
}

impl DiagnosticRun {
    pub fn new(config: Config, queue: TaskQueue) -> Self {
        Self {
            config,
            queue,
            base_options: TaskOptions::new(),
        }
    }

    /// Options every task starts from, before overrides.
    pub fn with_base_options(mut self, options: TaskOptions) -> Self {
        self.base_options = options;
        self
    }

    /// Execute the run, printing live status lines to `out`.
    ///
    /// Archive and report problems are logged and reflected in
    /// [`FinalizedRun::errors`]; only a broken queue precondition or a
    /// crashed pipeline stage returns an error, after finalizing whatever
    /// was collected.
    pub async fn execute<W>(self, out: W) -> DiagResult<RunOutcome>
    where
        W: Write + Send + 'static,
    {
        let filter = StatusFilter::parse(&self.config.filter)?;
        let overrides = OverrideEngine::parse(&self.config.overrides);
        let (archive, manifest) = prepare_output(&self.config);

        let capacity = self.config.channel_capacity.max(1);
        let (result_tx, result_rx) = mpsc::channel(capacity);
        let (file_tx, file_rx) = mpsc::channel(capacity);

        let orchestrator = Orchestrator::new(self.queue, self.base_options, overrides);
        let orchestrator_handle = tokio::spawn(orchestrator.run(result_tx, file_tx));
        let result_handle = tokio::spawn(ResultConsumer::new(filter, out).run(result_rx));
        let file_handle = tokio::spawn(FileConsumer::new(archive, manifest).run(file_rx));

        let (results, files) = tokio::join!(result_handle, file_handle);
        let (results, _out) = results.map_err(|e| DiagError::PipelineFailed(e.to_string()))?;
        let files = files.map_err(|e| DiagError::PipelineFailed(e.to_string()))?;

        let files_stored = files.stored.len();
        let files_failed = files.failed;
        let finalized = finalize(&self.config, &results, files);

        match orchestrator_handle.await {
            Ok(Ok(executed)) => info!(executed, "run complete"),
            Ok(Err(err)) => {
                error!(error = %err, "task execution aborted");
                return Err(err);
            }
            Err(err) => return Err(DiagError::PipelineFailed(err.to_string())),
        }

        Ok(RunOutcome {
            results,
            files_stored,
            files_failed,
            finalized,
        })
    }
}

/// Create the output directory, archive and manifest.
///
/// Failures are logged with guidance and degrade to no archive and an
/// in-memory manifest, so results are still collected.
fn prepare_output(config: &Config) -> (Option<Archive>, Manifest) {
    let output = &config.output_path;
    if let Err(err) = fs::create_dir_all(output) {
        error!(
            path = %output.display(),
            error = %err,
            "could not create output directory; choose another with --output-path or run with elevated permissions"
        );
        return (None, Manifest::in_memory());
    }

    let archive = match Archive::create(output.join(ARCHIVE_FILE_NAME)) {
        Ok(archive) => Some(archive),
        Err(err) => {
            error!(
                error = %err,
                "could not create archive; choose another --output-path or run with elevated permissions"
            );
            None
        }
    };

    (archive, Manifest::create(output.join(MANIFEST_FILE_NAME)))
}
