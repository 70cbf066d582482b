//! Domain layer for the diagnostics collector
//!
//! This module contains the check contract and the models that flow
//! through the run pipeline.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DiagError, DiagResult};
