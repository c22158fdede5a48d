//! CLI command handlers
//!
//! - Argument parsing structures
//! - Command routing and implementations

pub mod args;
pub mod router;

pub use args::{Cli, Commands, ConfigArgs, RunArgs};
pub use router::execute_command;
