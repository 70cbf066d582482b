//! User-supplied result overrides.
//!
//! Overrides come in as `Identifier.key=value` tokens separated by commas,
//! e.g. `Base/Config/Validate.agentLanguage=Java,Base/Env/CollectEnvVars.Status=Info`.
//! Every override targeting a task becomes an entry in that task's options.
//! The reserved keys `Status` and `Payload` replace the task's execution with
//! a synthesized result.

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::models::{Identifier, Status, TaskOptions, TaskResult};

/// Reserved option key that sets the result status and skips execution.
pub const STATUS_KEY: &str = "Status";
/// Reserved option key that sets the result payload and skips execution.
pub const PAYLOAD_KEY: &str = "Payload";

/// One parsed `Identifier.key=value` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub identifier: Identifier,
    pub key: String,
    pub value: String,
}

impl Override {
    /// Parse a single token.
    ///
    /// The value is everything after the first `=`; the key is whatever
    /// follows the last `.` on the left-hand side.
    pub fn parse(token: &str) -> Option<Self> {
        let (target, value) = token.trim().split_once('=')?;
        let (identifier, key) = target.trim().rsplit_once('.')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        let identifier = Identifier::parse(identifier).ok()?;
        Some(Self {
            identifier,
            key: key.to_string(),
            value: value.trim().to_string(),
        })
    }
}

/// Parse a comma-separated override list.
///
/// Malformed tokens are dropped with a warning instead of failing the run.
pub fn parse_overrides(raw: &str) -> Vec<Override> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let parsed = Override::parse(token);
            if parsed.is_none() {
                warn!(token, "ignoring malformed override, expected Identifier.key=value");
            }
            parsed
        })
        .collect()
}

/// Holds the parsed overrides for a run and applies them per task.
#[derive(Debug, Clone, Default)]
pub struct OverrideEngine {
    overrides: Vec<Override>,
}

impl OverrideEngine {
    pub fn new(overrides: Vec<Override>) -> Self {
        Self { overrides }
    }

    pub fn parse(raw: &str) -> Self {
        Self::new(parse_overrides(raw))
    }

    pub fn overrides(&self) -> &[Override] {
        &self.overrides
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Fresh options for one task: a copy of `base` with every override
    /// targeting `identifier` layered on top, in the order given.
    pub fn options_for(&self, base: &TaskOptions, identifier: &Identifier) -> TaskOptions {
        let mut options = base.clone();
        for o in self.overrides.iter().filter(|o| o.identifier.matches(identifier)) {
            debug!(identifier = %identifier, key = %o.key, "applying override");
            options.insert(o.key.clone(), o.value.clone());
        }
        options
    }

    /// Synthesize a result when the options carry `Status` or `Payload`.
    ///
    /// Returns `None` when the task should execute normally.
    pub fn overridden_result(
        &self,
        options: &TaskOptions,
        identifier: &Identifier,
    ) -> Option<TaskResult> {
        let status_value = options.get_ignore_case(STATUS_KEY);
        let payload_value = options.get_ignore_case(PAYLOAD_KEY);
        if status_value.is_none() && payload_value.is_none() {
            return None;
        }

        let mut result = TaskResult::default();
        let mut notes = Vec::new();

        if let Some(raw) = status_value {
            match Status::from_str(raw) {
                Some(status) => {
                    result.status = status;
                    notes.push(format!("Status set by override to {status}"));
                }
                None => {
                    warn!(identifier = %identifier, value = raw, "unrecognized status override");
                    notes.push(format!("Status override '{raw}' was not recognized"));
                }
            }
        }

        if let Some(raw) = payload_value {
            result.payload =
                Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())));
            notes.push("Payload set by override".to_string());
        }

        result.summary = notes.join("; ");
        Some(result)
    }
}
