//! Port trait definitions (Hexagonal Architecture)
//!
//! - Task: the contract every diagnostic check implements

pub mod task;

pub use task::{Task, UpstreamResults};
