//! Zip archive writer for collected evidence.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::domain::errors::{DiagError, DiagResult};

/// Archive file name inside the output directory.
pub const ARCHIVE_FILE_NAME: &str = "nrdiag-output.zip";
/// Prefix for every evidence file in the archive.
pub const OUTPUT_PREFIX: &str = "nrdiag-output/";
/// Prefix for the user-nominated include path.
pub const INCLUDE_PREFIX: &str = "Include/";

/// A Deflate-compressed zip being assembled on disk.
pub struct Archive {
    writer: ZipWriter<File>,
    path: PathBuf,
}

impl Archive {
    /// Create (or replace) the archive at `path`.
    pub fn create(path: impl Into<PathBuf>) -> DiagResult<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| DiagError::io(&path, e))?;
        Ok(Self {
            writer: ZipWriter::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn options(large_file: bool) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(large_file)
    }

    /// Copy a file from disk into the archive under `entry_name`.
    ///
    /// The source is opened before the entry is created, so a missing or
    /// unreadable file leaves no trace in the archive.
    pub fn add_file(&mut self, entry_name: &str, source: &Path) -> DiagResult<u64> {
        let mut file = File::open(source).map_err(|e| DiagError::io(source, e))?;
        let metadata = file.metadata().map_err(|e| DiagError::io(source, e))?;
        if !metadata.is_file() {
            return Err(DiagError::io(
                source,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        self.writer
            .start_file(entry_name, Self::options(metadata.len() >= u64::from(u32::MAX)))?;
        match io::copy(&mut file, &mut self.writer) {
            Ok(written) => Ok(written),
            Err(err) => {
                let _ = self.writer.abort_file();
                Err(DiagError::io(source, err))
            }
        }
    }

    /// Drain a chunk stream into a new entry, writing chunks as they arrive.
    pub async fn add_stream(
        &mut self,
        entry_name: &str,
        mut chunks: mpsc::Receiver<String>,
    ) -> DiagResult<u64> {
        self.writer.start_file(entry_name, Self::options(false))?;

        let mut written = 0u64;
        while let Some(chunk) = chunks.recv().await {
            if let Err(err) = self.writer.write_all(chunk.as_bytes()) {
                let _ = self.writer.abort_file();
                return Err(DiagError::io(entry_name, err));
            }
            written += chunk.len() as u64;
        }
        Ok(written)
    }

    /// Write an in-memory buffer as one entry.
    pub fn add_bytes(&mut self, entry_name: &str, bytes: &[u8]) -> DiagResult<()> {
        self.writer.start_file(entry_name, Self::options(false))?;
        if let Err(err) = self.writer.write_all(bytes) {
            let _ = self.writer.abort_file();
            return Err(DiagError::io(entry_name, err));
        }
        Ok(())
    }

    /// Write the central directory and close the file.
    pub fn finish(self) -> DiagResult<PathBuf> {
        let mut file = self.writer.finish()?;
        file.flush().map_err(|e| DiagError::io(&self.path, e))?;
        Ok(self.path)
    }
}
