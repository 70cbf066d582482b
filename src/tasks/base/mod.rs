//! Checks that apply to every agent.

pub mod config;
pub mod env;

pub use config::{CollectConfig, ValidateConfig};
pub use env::CollectEnvVars;
