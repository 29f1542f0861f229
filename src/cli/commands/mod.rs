//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod configurations;
pub mod init;
pub mod watch;
