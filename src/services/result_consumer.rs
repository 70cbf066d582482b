//! Result stream consumer.
//!
//! Prints one live status line per result that passes the status filter,
//! counts the ones that don't, and keeps every result in arrival order for
//! the final report.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::sync::Arc;

use console::{style, StyledObject};
use tracing::debug;

use crate::domain::errors::{DiagError, DiagResult};
use crate::domain::models::Status;
use crate::services::orchestrator::{RunReceiver, TaskRun};

/// Which statuses get a live status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(BTreeSet<Status>),
}

impl StatusFilter {
    /// Parse a comma-separated, case-insensitive list of status names, or `all`.
    pub fn parse(raw: &str) -> DiagResult<Self> {
        let mut statuses = BTreeSet::new();
        for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if name.eq_ignore_ascii_case("all") {
                return Ok(Self::All);
            }
            let status =
                Status::from_str(name).ok_or_else(|| DiagError::InvalidFilter(raw.to_string()))?;
            statuses.insert(status);
        }

        if statuses.is_empty() {
            return Err(DiagError::InvalidFilter(raw.to_string()));
        }
        Ok(Self::Only(statuses))
    }

    pub fn allows(&self, status: Status) -> bool {
        match self {
            Self::All => true,
            Self::Only(statuses) => statuses.contains(&status),
        }
    }
}

/// Everything the result stream delivered.
#[derive(Debug, Default)]
pub struct CollectedResults {
    /// Every result, in the order tasks finished.
    pub runs: Vec<Arc<TaskRun>>,
    /// Results held back by the filter, per status.
    pub filtered: BTreeMap<Status, usize>,
}

impl CollectedResults {
    /// Count of results per status, across shown and filtered ones.
    pub fn totals(&self) -> BTreeMap<Status, usize> {
        let mut totals = BTreeMap::new();
        for run in &self.runs {
            *totals.entry(run.result.status).or_insert(0) += 1;
        }
        totals
    }
}

/// Drains the result stream and renders status lines to `out`.
pub struct ResultConsumer<W> {
    filter: StatusFilter,
    out: W,
}

impl<W: Write> ResultConsumer<W> {
    pub fn new(filter: StatusFilter, out: W) -> Self {
        Self { filter, out }
    }

    /// Consume until the stream closes. Hands back the writer with the results.
    pub async fn run(mut self, mut rx: RunReceiver) -> (CollectedResults, W) {
        let mut collected = CollectedResults::default();

        while let Some(run) = rx.recv().await {
            let status = run.result.status;
            if self.filter.allows(status) {
                let line = status_line(&run);
                self.write_line(&line);
            } else {
                *collected.filtered.entry(status).or_insert(0) += 1;
            }
            collected.runs.push(run);
        }

        if let Some(line) = filtered_summary(&collected.filtered) {
            self.write_line(&line);
        }

        debug!(results = collected.runs.len(), "result stream drained");
        (collected, self.out)
    }

    fn write_line(&mut self, line: &str) {
        if let Err(err) = writeln!(self.out, "{line}") {
            debug!(error = %err, "could not write status line");
        }
    }
}

fn colorize(status: Status) -> StyledObject<String> {
    let label = style(format!("{:<8}", status.as_str()));
    match status {
        Status::Success => label.green(),
        Status::Warning => label.yellow(),
        Status::Failure => label.red(),
        Status::Error => label.red().bold(),
        Status::Info => label.blue(),
        Status::None => label.dim(),
    }
}

/// `Success  Base/Config/Collect`, with a marker for overridden results.
pub fn status_line(run: &TaskRun) -> String {
    let mut line = format!("{} {}", colorize(run.result.status), run.identifier);
    if run.was_overridden {
        line.push_str(" (overridden)");
    }
    line
}

/// `2 results not shown: 1 None, 1 Success`, or nothing when no result was held back.
pub fn filtered_summary(filtered: &BTreeMap<Status, usize>) -> Option<String> {
    let total: usize = filtered.values().sum();
    if total == 0 {
        return None;
    }
    let counts = filtered
        .iter()
        .map(|(status, count)| format!("{count} {status}"))
        .collect::<Vec<_>>()
        .join(", ");
    let noun = if total == 1 { "result" } else { "results" };
    Some(format!("{total} {noun} not shown: {counts}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Identifier, TaskOptions, TaskResult};
    use crate::domain::ports::{Task, UpstreamResults};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct Noop;

    #[async_trait]
    impl Task for Noop {
        fn identifier(&self) -> Identifier {
            Identifier::new("Base", "Test", "Noop")
        }

        fn explain(&self) -> String {
            String::new()
        }

        async fn execute(&self, _: &TaskOptions, _: &UpstreamResults) -> TaskResult {
            TaskResult::default()
        }
    }

    fn run(name: &str, status: Status) -> Arc<TaskRun> {
        Arc::new(TaskRun {
            task: Arc::new(Noop),
            identifier: Identifier::new("Base", "Test", name),
            result: TaskResult::new(status, "done"),
            was_overridden: false,
        })
    }

    async fn consume(filter: &str, runs: Vec<Arc<TaskRun>>) -> (CollectedResults, String) {
        let (tx, rx) = mpsc::channel(runs.len().max(1));
        for r in runs {
            tx.send(r).await.unwrap();
        }
        drop(tx);
        let consumer = ResultConsumer::new(StatusFilter::parse(filter).unwrap(), Vec::new());
        let (collected, out) = consumer.run(rx).await;
        (collected, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(StatusFilter::parse("ALL").unwrap(), StatusFilter::All);
        let filter = StatusFilter::parse("Failure, error").unwrap();
        assert!(filter.allows(Status::Failure));
        assert!(filter.allows(Status::Error));
        assert!(!filter.allows(Status::Success));
        assert!(StatusFilter::parse("failure,bogus").is_err());
        assert!(StatusFilter::parse(" , ").is_err());
    }

    #[tokio::test]
    async fn test_filtered_results_are_counted() {
        let (collected, out) = consume(
            "failure,error",
            vec![run("Ok", Status::Success), run("Bad", Status::Failure)],
        )
        .await;

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Base/Test/Bad"));
        assert!(lines[0].contains("Failure"));
        assert!(lines[1].contains("1 Success"));
        assert_eq!(collected.filtered.get(&Status::Success), Some(&1));
        assert_eq!(collected.runs.len(), 2);
    }

    #[tokio::test]
    async fn test_all_filter_prints_everything() {
        let (collected, out) = consume(
            "all",
            vec![run("A", Status::None), run("B", Status::Info)],
        )
        .await;
        assert_eq!(out.lines().count(), 2);
        assert!(collected.filtered.is_empty());
    }

    #[tokio::test]
    async fn test_runs_keep_arrival_order() {
        let (collected, _) = consume(
            "success",
            vec![
                run("First", Status::Warning),
                run("Second", Status::Success),
                run("Third", Status::Error),
            ],
        )
        .await;
        let names: Vec<&str> = collected
            .runs
            .iter()
            .map(|r| r.identifier.name.as_str())
            .collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
        assert_eq!(collected.totals().get(&Status::Error), Some(&1));
    }

    #[test]
    fn test_filtered_summary_format() {
        let mut filtered = BTreeMap::new();
        filtered.insert(Status::Success, 2);
        filtered.insert(Status::None, 1);
        assert_eq!(
            filtered_summary(&filtered).unwrap(),
            "3 results not shown: 1 None, 2 Success"
        );
        assert_eq!(filtered_summary(&BTreeMap::new()), None);
    }
}
