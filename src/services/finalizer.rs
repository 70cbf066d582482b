//! Archive finalizer: report, include path, seal.
//!
//! Runs after both consumers have drained. Every step is best effort: a
//! failure is logged and recorded, and the remaining steps still run.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::domain::errors::{DiagError, DiagResult};
use crate::domain::models::Config;
use crate::services::archive::{Archive, ARCHIVE_FILE_NAME, INCLUDE_PREFIX};
use crate::services::file_consumer::CollectedFiles;
use crate::services::manifest::MANIFEST_FILE_NAME;
use crate::services::report::{Report, REPORT_FILE_NAME};
use crate::services::result_consumer::CollectedResults;

/// Artifacts produced by the finalize step.
#[derive(Debug, Default)]
pub struct FinalizedRun {
    pub report_path: Option<PathBuf>,
    pub archive_path: Option<PathBuf>,
    pub included_files: usize,
    pub errors: Vec<DiagError>,
}

/// Write the report, fold it and the include path into the archive, and seal it.
pub fn finalize(config: &Config, results: &CollectedResults, files: CollectedFiles) -> FinalizedRun {
    let mut finalized = FinalizedRun::default();

    let report = Report::build(&results.runs, &files.stored, config, Utc::now());
    let report_path = config.output_path.join(REPORT_FILE_NAME);
    match report.write_to(&report_path) {
        Ok(()) => {
            info!(path = %report_path.display(), "report written");
            finalized.report_path = Some(report_path.clone());
        }
        Err(err) => {
            error!(
                path = %report_path.display(),
                error = %err,
                "could not write report; try another --output-path or run with elevated permissions"
            );
            finalized.errors.push(err);
        }
    }

    let Some(mut archive) = files.archive else {
        warn!("no archive to finalize");
        return finalized;
    };

    let added = if finalized.report_path.is_some() {
        archive.add_file(REPORT_FILE_NAME, &report_path).map(|_| ())
    } else {
        report
            .to_json()
            .and_then(|json| archive.add_bytes(REPORT_FILE_NAME, json.as_bytes()))
    };
    if let Err(err) = added {
        error!(error = %err, "could not add report to archive");
        finalized.errors.push(err);
    }

    if let Some(include) = &config.include {
        let skip = run_artifacts(&config.output_path);
        match add_include(&mut archive, include, config.include_limit_bytes, &skip) {
            Ok(count) => {
                info!(path = %include.display(), files = count, "include path added to archive");
                finalized.included_files = count;
            }
            Err(err) => {
                error!(path = %include.display(), error = %err, "could not add include path");
                finalized.errors.push(err);
            }
        }
    }

    match archive.finish() {
        Ok(path) => {
            info!(path = %path.display(), "archive sealed");
            finalized.archive_path = Some(path);
        }
        Err(err) => {
            error!(error = %err, "could not seal archive");
            finalized.errors.push(err);
        }
    }

    finalized
}

/// Canonical paths of the files this run writes into `output`.
fn run_artifacts(output: &Path) -> Vec<PathBuf> {
    [ARCHIVE_FILE_NAME, REPORT_FILE_NAME, MANIFEST_FILE_NAME]
        .iter()
        .filter_map(|name| fs::canonicalize(output.join(name)).ok())
        .collect()
}

fn is_skipped(path: &Path, skip: &[PathBuf]) -> bool {
    !skip.is_empty()
        && fs::canonicalize(path)
            .map(|p| skip.contains(&p))
            .unwrap_or(false)
}

/// Add a file or directory tree under `Include/`.
///
/// Files listed in `skip` (canonical paths, normally the run's own archive,
/// report and file list) are left out. The remaining tree is measured first;
/// anything over `limit` bytes is refused outright. Individual unreadable
/// files are skipped.
pub fn add_include(
    archive: &mut Archive,
    path: &Path,
    limit: u64,
    skip: &[PathBuf],
) -> DiagResult<usize> {
    let metadata = fs::metadata(path).map_err(|e| DiagError::io(path, e))?;
    let base = fs::canonicalize(path)
        .ok()
        .as_deref()
        .unwrap_or(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "include".to_string());

    if metadata.is_file() {
        if is_skipped(path, skip) {
            warn!(path = %path.display(), "include path is an output of this run, skipping");
            return Ok(0);
        }
        check_include_size(path, metadata.len(), limit)?;
        archive.add_file(&format!("{INCLUDE_PREFIX}{base}"), path)?;
        return Ok(1);
    }

    let mut files = Vec::new();
    let mut total = 0u64;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable include entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || is_skipped(entry.path(), skip) {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            total += meta.len();
        }
        files.push(entry.into_path());
    }
    check_include_size(path, total, limit)?;

    let mut added = 0;
    for file in files {
        let rel = file.strip_prefix(path).unwrap_or(&file);
        let name = format!(
            "{INCLUDE_PREFIX}{base}/{}",
            rel.to_string_lossy().replace('\\', "/")
        );
        match archive.add_file(&name, &file) {
            Ok(_) => added += 1,
            Err(err) => warn!(path = %file.display(), error = %err, "skipping include file"),
        }
    }
    Ok(added)
}

fn check_include_size(path: &Path, size: u64, limit: u64) -> DiagResult<()> {
    if size > limit {
        return Err(DiagError::IncludeTooLarge {
            path: path.to_path_buf(),
            size,
            limit,
        });
    }
    Ok(())
}
