//! CLI commands module.

mod config;
mod read;
mod util;
mod write;

pub use config::ConfigCommand;
pub use read::{CountCommand, DumpCommand, GetCommand, LatestCommand, ScanCommand};
pub use write::{ClearCommand, DeleteCommand, ExpireCommand, PutCommand};

// Re-export utils for use in commands
pub(crate) use util::*;
