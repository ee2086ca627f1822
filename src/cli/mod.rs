//! Command-line interface for rolas.
//!
//! Scanning, listing, searching and editing the library, plus the
//! person/group classification of performers.

mod commands;

pub use commands::{Cli, Commands, run_command};
