//! Plain-text ledger of archived evidence files.
//!
//! Each archived file gets one block:
//!
//! ```text
//! Stored file name:nrdiag-output/Base/Config/newrelic.yml
//! Original path:/etc/newrelic/newrelic.yml
//! ```
//!
//! Blocks are appended to the on-disk copy as they are recorded, so the file
//! reflects partial progress if the run dies midway.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Name of the manifest, on disk and at the archive root.
pub const MANIFEST_FILE_NAME: &str = "nrdiag-filelist.txt";

#[derive(Debug, Default)]
pub struct Manifest {
    contents: String,
    file: Option<File>,
    path: Option<PathBuf>,
}

impl Manifest {
    /// A manifest kept only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A manifest mirrored to `path`, truncating any previous run's copy.
    /// Falls back to memory only when the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path);
        match file {
            Ok(file) => Self {
                contents: String::new(),
                file: Some(file),
                path: Some(path.to_path_buf()),
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not create manifest file, keeping it in memory");
                Self::in_memory()
            }
        }
    }

    /// Append the block for one archived file.
    pub fn record(&mut self, stored_name: &str, original_path: &Path) {
        let block = format!(
            "Stored file name:{}\nOriginal path:{}\n",
            stored_name,
            original_path.display()
        );
        self.contents.push_str(&block);

        if let Some(file) = self.file.as_mut() {
            if let Err(err) = file.write_all(block.as_bytes()).and_then(|()| file.flush()) {
                warn!(error = %err, "could not append to manifest file");
            }
        }
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Where the on-disk copy lives, if there is one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Stored names in recording order.
    pub fn stored_names(&self) -> Vec<&str> {
        self.contents
            .lines()
            .filter_map(|line| line.strip_prefix("Stored file name:"))
            .collect()
    }
}
