//! Built-in diagnostic checks.

use std::sync::Arc;

use crate::domain::errors::DiagResult;
use crate::services::TaskRegistry;

pub mod base;

/// Registry holding every built-in check.
pub fn registry() -> DiagResult<TaskRegistry> {
    let mut registry = TaskRegistry::new();
    registry.register(Arc::new(base::CollectEnvVars))?;
    registry.register(Arc::new(base::CollectConfig))?;
    registry.register(Arc::new(base::ValidateConfig))?;
    Ok(registry)
}
