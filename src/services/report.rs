//! JSON report model (`nrdiag-output.json`).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::errors::{DiagError, DiagResult};
use crate::domain::models::{Config, Status};
use crate::services::file_consumer::StoredFile;
use crate::services::orchestrator::TaskRun;

/// Report file name, in the output directory and at the archive root.
pub const REPORT_FILE_NAME: &str = "nrdiag-output.json";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Report {
    pub run_date: DateTime<Utc>,
    pub diag_version: String,
    pub configuration: Config,
    pub results: Vec<ReportEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportEntry {
    pub task: String,
    pub result: ReportResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportResult {
    pub status: Status,
    pub summary: String,
    #[serde(rename = "URL")]
    pub url: String,
    pub files_to_copy: Vec<ReportFile>,
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub overridden: bool,
}

/// Serialized form of one evidence file. Stream handles never appear here.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportFile {
    pub path: PathBuf,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_name: Option<String>,
    pub streamed: bool,
}

impl Report {
    /// Build the report from the ordered results and the files that were archived.
    pub fn build(
        runs: &[Arc<TaskRun>],
        stored: &[StoredFile],
        configuration: &Config,
        run_date: DateTime<Utc>,
    ) -> Self {
        let stored_names: HashMap<(String, usize), &str> = stored
            .iter()
            .map(|f| ((f.task.key(), f.file_index), f.store_name.as_str()))
            .collect();

        let results = runs
            .iter()
            .map(|run| {
                let files_to_copy = run
                    .result
                    .files_to_copy
                    .iter()
                    .enumerate()
                    .map(|(file_index, envelope)| {
                        let name = envelope.file_name();
                        let stored_name = stored_names
                            .get(&(run.identifier.key(), file_index))
                            .and_then(|store_name| store_name.rsplit('/').next())
                            .filter(|stored| *stored != name)
                            .map(str::to_string);
                        ReportFile {
                            path: envelope.path().to_path_buf(),
                            name,
                            stored_name,
                            streamed: envelope.is_streamed(),
                        }
                    })
                    .collect();

                ReportEntry {
                    task: run.identifier.to_string(),
                    result: ReportResult {
                        status: run.result.status,
                        summary: run.result.summary.clone(),
                        url: run.result.url.clone(),
                        files_to_copy,
                        payload: run.result.payload.clone(),
                        overridden: run.was_overridden,
                    },
                }
            })
            .collect();

        Self {
            run_date,
            diag_version: env!("CARGO_PKG_VERSION").to_string(),
            configuration: configuration.clone(),
            results,
        }
    }

    pub fn to_json(&self) -> DiagResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_to(&self, path: &Path) -> DiagResult<()> {
        let file = File::create(path).map_err(|e| DiagError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(|e| DiagError::io(path, e))
    }
}
