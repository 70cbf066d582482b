//! Implementation of the `nrdiag run` command.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::application::{DiagnosticRun, RunOutcome};
use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::tasks;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Configuration file (defaults to ./nrdiag.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for the report, file list and archive
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// Statuses to print as checks finish: comma-separated names or `all`
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Result overrides, e.g. Base/Config/Validate.Status=Warning
    #[arg(long = "override")]
    pub overrides: Option<String>,

    /// Extra file or directory to add to the archive under Include/
    #[arg(short, long)]
    pub include: Option<PathBuf>,

    /// Only run these checks and their dependencies (Base/Config/Validate or Base/*)
    #[arg(short, long, value_delimiter = ',')]
    pub tasks: Vec<String>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

/// The subset of the configuration set on the command line.
#[derive(Debug, Default, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    overrides: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tasks: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    logging: BTreeMap<String, String>,
}

impl From<&RunArgs> for CliOverrides {
    fn from(args: &RunArgs) -> Self {
        let mut logging = BTreeMap::new();
        if args.verbose {
            logging.insert("level".to_string(), "debug".to_string());
        }
        Self {
            output_path: args.output_path.clone(),
            filter: args.filter.clone(),
            overrides: args.overrides.clone(),
            include: args.include.clone(),
            tasks: args.tasks.clone(),
            logging,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub archive: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub totals: BTreeMap<String, usize>,
    pub files_stored: usize,
    pub files_failed: usize,
    pub errors: Vec<String>,
}

impl From<&RunOutcome> for RunOutput {
    fn from(outcome: &RunOutcome) -> Self {
        Self {
            archive: outcome.finalized.archive_path.clone(),
            report: outcome.finalized.report_path.clone(),
            totals: outcome
                .results
                .totals()
                .into_iter()
                .map(|(status, count)| (status.to_string(), count))
                .collect(),
            files_stored: outcome.files_stored,
            files_failed: outcome.files_failed,
            errors: outcome
                .finalized
                .errors
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![String::new()];
        let totals = self
            .totals
            .iter()
            .map(|(status, count)| format!("{count} {status}"))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Checks completed: {totals}"));
        lines.push(format!(
            "Evidence files collected: {} ({} skipped)",
            self.files_stored, self.files_failed
        ));
        if let Some(report) = &self.report {
            lines.push(format!("Results written to {}", report.display()));
        }
        if let Some(archive) = &self.archive {
            lines.push(format!("Archive written to {}", archive.display()));
        }
        for err in &self.errors {
            lines.push(format!("Warning: {err}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load(args.config.as_deref(), &CliOverrides::from(&args))?;
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;

    let queue = tasks::registry()
        .context("Failed to register built-in checks")?
        .resolve(&config.tasks)
        .context("Failed to resolve the checks to run")?;

    if !json_mode {
        println!("Check Results");
        println!("-------------");
    }

    let run = DiagnosticRun::new(config, queue);
    let outcome = if json_mode {
        run.execute(io::sink()).await
    } else {
        run.execute(io::stdout()).await
    }
    .context("Diagnostics run failed")?;

    output(&RunOutput::from(&outcome), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_skip_unset_values() {
        let args = RunArgs {
            filter: Some("all".to_string()),
            verbose: true,
            ..RunArgs::default()
        };
        let value = serde_json::to_value(CliOverrides::from(&args)).unwrap();
        assert_eq!(value["filter"], "all");
        assert_eq!(value["logging"]["level"], "debug");
        assert!(value.get("output_path").is_none());
        assert!(value.get("tasks").is_none());
    }
}
