//! Shared utilities

pub mod command;

pub use command::{create_command, parse_git_version, run_git};
