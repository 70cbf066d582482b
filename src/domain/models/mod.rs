pub mod config;
pub mod identifier;
pub mod options;
pub mod result;
pub mod status;

pub use config::{Config, LoggingConfig};
pub use identifier::Identifier;
pub use options::TaskOptions;
pub use result::{ContentStream, FileCopyEnvelope, FileSource, TaskResult};
pub use status::Status;
