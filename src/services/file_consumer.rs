//! File stream consumer: deduplicates evidence names and assembles the archive.
//!
//! Entries are accepted in arrival order while the stream is open, then
//! archived once it closes. Any failure on a single file is logged and that
//! file skipped; the remaining entries are still archived.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::domain::errors::{DiagError, DiagResult};
use crate::domain::models::{FileCopyEnvelope, FileSource, Identifier};
use crate::services::archive::{Archive, OUTPUT_PREFIX};
use crate::services::manifest::{Manifest, MANIFEST_FILE_NAME};
use crate::services::orchestrator::RunReceiver;

/// Renaming attempts before a colliding entry is given up on.
pub const MAX_NAME_ATTEMPTS: u32 = 50;

/// Tracks the archive names and source paths already taken.
#[derive(Debug, Default)]
pub struct NameDeduplicator {
    /// Lower-cased store names, so entries never collide on
    /// case-insensitive file systems after extraction.
    stored_names: HashSet<String>,
    seen_paths: HashSet<PathBuf>,
}

impl NameDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide what happens to one envelope.
    ///
    /// Returns `Ok(None)` when the same disk file was already accepted, and
    /// otherwise a copy of the envelope carrying its owner and the counter
    /// that makes its store name unique. The owner is the envelope's own
    /// identifier when set, `origin` otherwise.
    pub fn accept(
        &mut self,
        envelope: &FileCopyEnvelope,
        origin: &Identifier,
    ) -> DiagResult<Option<AcceptedFile>> {
        if !envelope.is_streamed() && self.seen_paths.contains(envelope.path()) {
            return Ok(None);
        }

        let owner = envelope.identifier.clone().unwrap_or_else(|| origin.clone());
        let mut candidate = envelope.clone().with_identifier(owner.clone());

        for _ in 0..MAX_NAME_ATTEMPTS {
            if self.stored_names.insert(candidate.store_name().to_lowercase()) {
                self.seen_paths.insert(candidate.path().to_path_buf());
                return Ok(Some(AcceptedFile {
                    envelope: candidate,
                    owner,
                }));
            }
            candidate.duplicate_count += 1;
        }

        Err(DiagError::NameCollisionExhausted {
            path: envelope.path().display().to_string(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }
}

/// An envelope that passed deduplication.
#[derive(Debug, Clone)]
pub struct AcceptedFile {
    pub envelope: FileCopyEnvelope,
    /// Check the file is filed under in the archive.
    pub owner: Identifier,
}

impl AcceptedFile {
    pub fn store_name(&self) -> String {
        self.envelope.store_name()
    }
}

/// One evidence file that made it into the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Check that returned the file.
    pub task: Identifier,
    /// Position of the file in that check's `files_to_copy`.
    pub file_index: usize,
    /// Check the file is filed under; differs from `task` only when the
    /// envelope named its own identifier.
    pub owner: Identifier,
    pub original_path: PathBuf,
    /// Name relative to the `nrdiag-output/` prefix.
    pub store_name: String,
    pub streamed: bool,
}

impl StoredFile {
    /// Full entry name inside the archive.
    pub fn archive_name(&self) -> String {
        format!("{OUTPUT_PREFIX}{}", self.store_name)
    }
}

/// What the file consumer hands to the finalizer.
#[derive(Default)]
pub struct CollectedFiles {
    /// Still open so the finalizer can add the report and include path.
    pub archive: Option<Archive>,
    pub manifest: Manifest,
    pub stored: Vec<StoredFile>,
    /// Entries dropped because of read, write or naming failures.
    pub failed: usize,
}

/// Drains the file stream into the archive.
pub struct FileConsumer {
    archive: Option<Archive>,
    manifest: Manifest,
    names: NameDeduplicator,
}

impl FileConsumer {
    /// `archive` is `None` when it could not be created; the stream is
    /// still drained so the orchestrator never stalls.
    pub fn new(archive: Option<Archive>, manifest: Manifest) -> Self {
        Self {
            archive,
            manifest,
            names: NameDeduplicator::new(),
        }
    }

    pub async fn run(mut self, mut rx: RunReceiver) -> CollectedFiles {
        let mut accepted = Vec::new();
        let mut failed = 0;

        while let Some(run) = rx.recv().await {
            for (file_index, envelope) in run.result.files_to_copy.iter().enumerate() {
                match self.names.accept(envelope, &run.identifier) {
                    Ok(Some(entry)) => accepted.push((run.identifier.clone(), file_index, entry)),
                    Ok(None) => {
                        debug!(path = %envelope.path().display(), "file already queued, skipping");
                    }
                    Err(err) => {
                        error!(identifier = %run.identifier, error = %err, "dropping evidence file");
                        failed += 1;
                    }
                }
            }
        }

        let Some(mut archive) = self.archive else {
            if !accepted.is_empty() {
                warn!(files = accepted.len(), "no archive available, evidence files not collected");
            }
            return CollectedFiles {
                archive: None,
                manifest: self.manifest,
                stored: Vec::new(),
                failed: failed + accepted.len(),
            };
        };

        let mut stored = Vec::with_capacity(accepted.len());
        for (task, file_index, entry) in accepted {
            match archive_entry(&mut archive, &mut self.manifest, &entry).await {
                Ok(()) => stored.push(StoredFile {
                    task,
                    file_index,
                    original_path: entry.envelope.path().to_path_buf(),
                    store_name: entry.store_name(),
                    streamed: entry.envelope.is_streamed(),
                    owner: entry.owner,
                }),
                Err(err) => {
                    error!(path = %entry.envelope.path().display(), error = %err, "could not archive evidence file");
                    failed += 1;
                }
            }
        }

        if let Err(err) = archive.add_bytes(MANIFEST_FILE_NAME, self.manifest.contents().as_bytes()) {
            error!(error = %err, "could not add manifest to archive");
        }

        info!(stored = stored.len(), failed, "evidence files archived");
        CollectedFiles {
            archive: Some(archive),
            manifest: self.manifest,
            stored,
            failed,
        }
    }
}

async fn archive_entry(
    archive: &mut Archive,
    manifest: &mut Manifest,
    entry: &AcceptedFile,
) -> DiagResult<()> {
    let archive_name = format!("{OUTPUT_PREFIX}{}", entry.store_name());

    let bytes = match &entry.envelope.source {
        FileSource::Disk(path) => archive.add_file(&archive_name, path)?,
        FileSource::Stream { name, stream } => {
            let chunks = stream.take().ok_or_else(|| {
                DiagError::Archive(format!("stream {} was already consumed", name.display()))
            })?;
            archive.add_stream(&archive_name, chunks).await?
        }
    };

    manifest.record(&archive_name, entry.envelope.path());
    debug!(name = %archive_name, bytes, "archived evidence file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ContentStream, Status, TaskOptions, TaskResult};
    use crate::domain::ports::{Task, UpstreamResults};
    use crate::services::orchestrator::TaskRun;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct Noop;

    #[async_trait]
    impl Task for Noop {
        fn identifier(&self) -> Identifier {
            Identifier::new("Base", "Env", "CollectEnvVars")
        }

        fn explain(&self) -> String {
            String::new()
        }

        async fn execute(&self, _: &TaskOptions, _: &UpstreamResults) -> TaskResult {
            TaskResult::default()
        }
    }

    fn stream(name: &str, text: &str) -> FileCopyEnvelope {
        FileCopyEnvelope::from_stream(name, ContentStream::from_chunks(vec![text.to_string()]))
    }

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).unwrap()
    }

    #[test]
    fn test_colliding_names_get_counters() {
        let mut names = NameDeduplicator::new();
        let first = names
            .accept(&FileCopyEnvelope::from_disk("/etc/newrelic.yml"), &id("Base/Config/Collect"))
            .unwrap()
            .unwrap();
        let second = names
            .accept(&FileCopyEnvelope::from_disk("/app/newrelic.yml"), &id("Base/Config/Validate"))
            .unwrap()
            .unwrap();
        let third = names
            .accept(&FileCopyEnvelope::from_disk("/opt/newrelic.yml"), &id("Base/Config/Other"))
            .unwrap()
            .unwrap();

        assert_eq!(first.store_name(), "Base/Config/newrelic.yml");
        assert_eq!(second.store_name(), "Base/Config/newrelic(1).yml");
        assert_eq!(third.store_name(), "Base/Config/newrelic(2).yml");
    }

    #[test]
    fn test_same_disk_path_accepted_once() {
        let mut names = NameDeduplicator::new();
        let envelope = FileCopyEnvelope::from_disk("/etc/newrelic.yml");
        assert!(names.accept(&envelope, &id("Base/Config/Collect")).unwrap().is_some());
        assert!(names.accept(&envelope, &id("Base/Config/Validate")).unwrap().is_none());
    }

    #[test]
    fn test_streams_with_same_name_are_all_kept() {
        let mut names = NameDeduplicator::new();
        let origin = id("Base/Env/CollectEnvVars");
        let a = FileCopyEnvelope::from_stream("env.txt", ContentStream::from_chunks(vec![]));
        let b = FileCopyEnvelope::from_stream("env.txt", ContentStream::from_chunks(vec![]));

        let a = names.accept(&a, &origin).unwrap().unwrap();
        let b = names.accept(&b, &origin).unwrap().unwrap();
        assert_ne!(a.store_name(), b.store_name());
    }

    #[test]
    fn test_existing_identifier_is_kept() {
        let mut names = NameDeduplicator::new();
        let envelope =
            FileCopyEnvelope::from_disk("/etc/app.log").with_identifier(id("Java/Logs/Collect"));
        let accepted = names.accept(&envelope, &id("Base/Config/Collect")).unwrap().unwrap();
        assert_eq!(accepted.store_name(), "Java/Logs/app.log");
        assert_eq!(accepted.owner, id("Java/Logs/Collect"));
    }

    #[test]
    fn test_names_collide_ignoring_case() {
        let mut names = NameDeduplicator::new();
        let origin = id("Base/Config/Collect");
        names
            .accept(&FileCopyEnvelope::from_disk("/a/NewRelic.yml"), &origin)
            .unwrap();
        let second = names
            .accept(&FileCopyEnvelope::from_disk("/b/newrelic.yml"), &origin)
            .unwrap()
            .unwrap();
        assert_eq!(second.store_name(), "Base/Config/newrelic(1).yml");
    }

    #[test]
    fn test_collision_exhaustion() {
        let mut names = NameDeduplicator::new();
        let origin = id("Base/Config/Collect");
        for i in 0..MAX_NAME_ATTEMPTS {
            let path = format!("/dir{i}/newrelic.yml");
            assert!(names.accept(&FileCopyEnvelope::from_disk(path), &origin).is_ok());
        }
        let err = names
            .accept(&FileCopyEnvelope::from_disk("/last/newrelic.yml"), &origin)
            .err()
            .unwrap();
        assert!(matches!(err, DiagError::NameCollisionExhausted { attempts: 50, .. }));
    }

    #[tokio::test]
    async fn test_stored_files_remember_their_position() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::create(dir.path().join("out.zip")).unwrap();
        let task = id("Base/Env/CollectEnvVars");
        let run = Arc::new(TaskRun {
            task: Arc::new(Noop),
            identifier: task.clone(),
            result: TaskResult::new(Status::Info, "two streams")
                .with_files(vec![stream("env.txt", "first"), stream("env.txt", "second")]),
            was_overridden: false,
        });

        let (tx, rx) = mpsc::channel(1);
        tx.send(run).await.unwrap();
        drop(tx);
        let collected = FileConsumer::new(Some(archive), Manifest::in_memory())
            .run(rx)
            .await;

        assert_eq!(collected.stored.len(), 2);
        assert_eq!(collected.stored[0].task, task);
        assert_eq!(collected.stored[0].file_index, 0);
        assert_eq!(collected.stored[0].store_name, "Base/Env/env.txt");
        assert_eq!(collected.stored[1].file_index, 1);
        assert_eq!(collected.stored[1].store_name, "Base/Env/env(1).txt");
        let archived: Vec<String> = collected.stored.iter().map(StoredFile::archive_name).collect();
        assert_eq!(collected.manifest.stored_names(), archived);
        assert_eq!(archived[1], "nrdiag-output/Base/Env/env(1).txt");
    }
}
