//! Orchestrator: executes the task queue and publishes every outcome.
//!
//! Tasks run strictly one after another. Each finished result is published
//! to the result stream, and again to the file stream when it carries
//! evidence files. Dropping both senders at the end is the only signal the
//! consumers get that the run is over.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::domain::errors::{DiagError, DiagResult};
use crate::domain::models::{Identifier, TaskOptions, TaskResult};
use crate::domain::ports::{Task, UpstreamResults};
use crate::services::override_engine::OverrideEngine;
use crate::services::task_queue::TaskQueue;

/// A result tagged with the task that produced it.
#[derive(Clone)]
pub struct TaskRun {
    pub task: Arc<dyn Task>,
    pub identifier: Identifier,
    pub result: TaskResult,
    /// The result came from an override and the task never executed.
    pub was_overridden: bool,
}

impl fmt::Debug for TaskRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRun")
            .field("identifier", &self.identifier)
            .field("result", &self.result)
            .field("was_overridden", &self.was_overridden)
            .finish()
    }
}

/// Sending half of the result and file streams.
pub type RunSender = mpsc::Sender<Arc<TaskRun>>;
/// Receiving half of the result and file streams.
pub type RunReceiver = mpsc::Receiver<Arc<TaskRun>>;

/// Walks a validated [`TaskQueue`] in order.
pub struct Orchestrator {
    queue: TaskQueue,
    base_options: TaskOptions,
    overrides: OverrideEngine,
}

impl Orchestrator {
    pub fn new(queue: TaskQueue, base_options: TaskOptions, overrides: OverrideEngine) -> Self {
        Self {
            queue,
            base_options,
            overrides,
        }
    }

    /// Execute every queued task and publish the results.
    ///
    /// Publishing waits for room in the bounded streams, which throttles the
    /// run to the pace of the slower consumer. Both streams close when this
    /// returns, including on error. Returns the number of tasks executed.
    pub async fn run(self, result_tx: RunSender, file_tx: RunSender) -> DiagResult<usize> {
        let mut completed: HashMap<String, TaskResult> = HashMap::new();
        let total = self.queue.len();
        info!(total, "starting task execution");

        for task in self.queue {
            let identifier = task.identifier();
            let options = self.overrides.options_for(&self.base_options, &identifier);
            let upstream = upstream_results(task.as_ref(), &identifier, &completed)?;

            let (result, was_overridden) =
                match self.overrides.overridden_result(&options, &identifier) {
                    Some(result) => {
                        info!(identifier = %identifier, status = %result.status, "result set by override");
                        (result, true)
                    }
                    None => {
                        let span = info_span!("task", identifier = %identifier);
                        let result = task.execute(&options, &upstream).instrument(span).await;
                        debug!(identifier = %identifier, status = %result.status, "task finished");
                        (result, false)
                    }
                };

            completed.insert(identifier.key(), result.clone());

            let run = Arc::new(TaskRun {
                task,
                identifier,
                result,
                was_overridden,
            });
            let has_files = !run.result.files_to_copy.is_empty();

            if result_tx.send(Arc::clone(&run)).await.is_err() {
                warn!(identifier = %run.identifier, "result stream closed early, dropping result");
            }
            if has_files && file_tx.send(run).await.is_err() {
                warn!("file stream closed early, dropping evidence files");
            }
        }

        info!(total, "task execution finished");
        Ok(total)
    }
}

/// Collect the results a task declared it depends on, keyed the way the
/// task spelled them.
fn upstream_results(
    task: &dyn Task,
    identifier: &Identifier,
    completed: &HashMap<String, TaskResult>,
) -> DiagResult<UpstreamResults> {
    let mut upstream = UpstreamResults::new();
    for dependency in task.dependencies() {
        let key = Identifier::parse(&dependency)?.key();
        let result = completed
            .get(&key)
            .ok_or_else(|| DiagError::MissingUpstreamResult {
                task: identifier.to_string(),
                dependency: dependency.clone(),
            })?;
        upstream.insert(dependency, result.clone());
    }
    Ok(upstream)
}
