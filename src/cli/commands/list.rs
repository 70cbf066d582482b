//! Implementation of the `nrdiag list` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, truncate, CommandOutput};
use crate::tasks;

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only list checks matching these patterns (and their dependencies)
    #[arg(short, long, value_delimiter = ',')]
    pub tasks: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckEntry {
    pub identifier: String,
    pub explain: String,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ListOutput {
    pub checks: Vec<CheckEntry>,
}

impl CommandOutput for ListOutput {
    fn to_human(&self) -> String {
        if self.checks.is_empty() {
            return "No checks found.".to_string();
        }

        let width = self
            .checks
            .iter()
            .map(|c| c.identifier.len())
            .max()
            .unwrap_or(0);

        let mut lines = Vec::with_capacity(self.checks.len() + 1);
        lines.push(format!("{} check(s), in execution order:", self.checks.len()));
        for check in &self.checks {
            let mut line = format!(
                "  {:<width$}  {}",
                check.identifier,
                truncate(&check.explain, 70),
            );
            if !check.dependencies.is_empty() {
                line.push_str(&format!(" [after {}]", check.dependencies.join(", ")));
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ListArgs, json_mode: bool) -> Result<()> {
    let queue = tasks::registry()
        .context("Failed to register built-in checks")?
        .resolve(&args.tasks)
        .context("Failed to resolve checks")?;

    let checks = queue
        .tasks()
        .iter()
        .map(|task| CheckEntry {
            identifier: task.identifier().to_string(),
            explain: task.explain(),
            dependencies: task.dependencies(),
        })
        .collect();

    output(&ListOutput { checks }, json_mode);
    Ok(())
}
