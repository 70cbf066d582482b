//! Application layer: coordinates a full diagnostics run.

pub mod diagnostic_run;

pub use diagnostic_run::{DiagnosticRun, RunOutcome};
