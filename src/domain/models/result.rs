//! Check result model and evidence-file envelopes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::identifier::Identifier;
use super::status::Status;

/// Verdict returned by a single check.
#[derive(Debug, Clone, Default)]
pub struct TaskResult {
    pub status: Status,
    pub summary: String,
    pub url: String,
    /// Opaque value shared between a check and its dependents. The pipeline
    /// only forwards and serializes it.
    pub payload: Option<Value>,
    pub files_to_copy: Vec<FileCopyEnvelope>,
}

impl TaskResult {
    pub fn new(status: Status, summary: impl Into<String>) -> Self {
        Self {
            status,
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Attach a payload. Values that fail to serialize are dropped.
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload = serde_json::to_value(payload).ok();
        self
    }

    pub fn with_files(mut self, files: Vec<FileCopyEnvelope>) -> Self {
        self.files_to_copy = files;
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    pub fn has_payload(&self) -> bool {
        self.status.has_payload()
    }

    /// Decode the payload into the type agreed on with the producing check.
    /// Returns `None` when the status says no payload applies.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Option<T> {
        if !self.has_payload() {
            return None;
        }
        self.payload
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Live, order-preserving sequence of text chunks.
///
/// Clones share the same receiver; the first consumer to [`take`](Self::take)
/// it drains the content.
#[derive(Clone)]
pub struct ContentStream {
    inner: Arc<Mutex<Option<mpsc::Receiver<String>>>>,
}

impl ContentStream {
    /// Create a stream fed by the returned sender. Dropping the sender ends it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::from_receiver(rx))
    }

    pub fn from_receiver(rx: mpsc::Receiver<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// A finished stream holding the given chunks.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let chunks: Vec<String> = chunks.into_iter().collect();
        let (tx, stream) = Self::channel(chunks.len());
        for chunk in chunks {
            // capacity equals the chunk count
            let _ = tx.try_send(chunk);
        }
        stream
    }

    /// Take the receiver. Later calls return `None`.
    pub fn take(&self) -> Option<mpsc::Receiver<String>> {
        self.inner.lock().ok().and_then(|mut guard| guard.take())
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream").finish_non_exhaustive()
    }
}

/// Where an evidence file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A file already on disk.
    Disk(PathBuf),
    /// Content produced while the run is going; `name` is a display path.
    Stream { name: PathBuf, stream: ContentStream },
}

/// One evidence file a check wants in the archive.
#[derive(Debug, Clone)]
pub struct FileCopyEnvelope {
    pub source: FileSource,
    /// Check that produced the file; filled in from the result when absent.
    pub identifier: Option<Identifier>,
    /// Non-zero once the name had to be deduplicated.
    pub duplicate_count: u32,
}

impl FileCopyEnvelope {
    pub fn from_disk(path: impl Into<PathBuf>) -> Self {
        Self {
            source: FileSource::Disk(path.into()),
            identifier: None,
            duplicate_count: 0,
        }
    }

    pub fn from_stream(name: impl Into<PathBuf>, stream: ContentStream) -> Self {
        Self {
            source: FileSource::Stream {
                name: name.into(),
                stream,
            },
            identifier: None,
            duplicate_count: 0,
        }
    }

    pub fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Source path on disk, or the display name for streamed content.
    pub fn path(&self) -> &Path {
        match &self.source {
            FileSource::Disk(path) => path,
            FileSource::Stream { name, .. } => name,
        }
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self.source, FileSource::Stream { .. })
    }

    /// Base file name without directories.
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path().to_string_lossy().into_owned())
    }

    /// Archive-relative name: `Category/Subcategory/<file>`, with `(n)`
    /// inserted before the extension once `duplicate_count` is non-zero.
    pub fn store_name(&self) -> String {
        let base = self.deduplicated_file_name();
        match &self.identifier {
            Some(id) => format!("{}/{}/{}", id.category, id.subcategory, base),
            None => base,
        }
    }

    fn deduplicated_file_name(&self) -> String {
        let file_name = self.file_name();
        if self.duplicate_count == 0 {
            return file_name;
        }

        let path = Path::new(&file_name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        match path.extension() {
            Some(ext) => format!("{}({}).{}", stem, self.duplicate_count, ext.to_string_lossy()),
            None => format!("{}({})", stem, self.duplicate_count),
        }
    }
}
