//! Common test utilities for integration tests
//!
//! Shared fixtures for the pipeline tests: a scripted check, a capturing
//! writer for status lines, and archive inspection helpers.

#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nrdiag::domain::models::{
    ContentStream, FileCopyEnvelope, Identifier, Status, TaskOptions, TaskResult,
};
use nrdiag::domain::ports::{Task, UpstreamResults};
use tempfile::TempDir;

/// Create a temporary directory for test isolation
///
/// Returns a TempDir that will be cleaned up when dropped.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A check that returns a fixed result and counts its executions.
pub struct ScriptedTask {
    pub id: Identifier,
    pub deps: Vec<String>,
    pub status: Status,
    pub files: Vec<String>,
    pub streams: Vec<(String, String)>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedTask {
    pub fn new(id: &str, status: Status) -> Self {
        Self {
            id: Identifier::parse(id).expect("valid identifier"),
            deps: Vec::new(),
            status,
            files: Vec::new(),
            streams: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn after(mut self, dependency: &str) -> Self {
        self.deps.push(dependency.to_string());
        self
    }

    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.files.push(path.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add a streamed file after the disk files.
    pub fn with_stream(mut self, name: &str, text: &str) -> Self {
        self.streams.push((name.to_string(), text.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for ScriptedTask {
    fn identifier(&self) -> Identifier {
        self.id.clone()
    }

    fn explain(&self) -> String {
        format!("scripted {}", self.id)
    }

    fn dependencies(&self) -> Vec<String> {
        self.deps.clone()
    }

    async fn execute(&self, _options: &TaskOptions, _upstream: &UpstreamResults) -> TaskResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut files: Vec<FileCopyEnvelope> =
            self.files.iter().map(FileCopyEnvelope::from_disk).collect();
        files.extend(self.streams.iter().map(|(name, text)| {
            FileCopyEnvelope::from_stream(name, ContentStream::from_chunks(vec![text.clone()]))
        }));
        TaskResult::new(self.status, format!("{} ran", self.id)).with_files(files)
    }
}

/// Writer whose contents stay readable after it is moved into the run.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Captured text with styling stripped.
    pub fn text(&self) -> String {
        let bytes = self.0.lock().expect("buffer lock").clone();
        console::strip_ansi_codes(&String::from_utf8_lossy(&bytes)).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Entry names of a finished archive.
pub fn archive_entries(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).expect("open archive");
    let zip = zip::ZipArchive::new(file).expect("archive is readable");
    zip.file_names().map(str::to_string).collect()
}

/// Contents of one archive entry.
pub fn archive_entry(path: &Path, name: &str) -> String {
    let file = std::fs::File::open(path).expect("open archive");
    let mut zip = zip::ZipArchive::new(file).expect("archive is readable");
    let mut entry = zip.by_name(name).expect("entry present");
    let mut contents = String::new();
    entry.read_to_string(&mut contents).expect("entry is text");
    contents
}
