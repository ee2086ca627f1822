//! Rolas - a music library manager.
//!
//! Scans a directory tree for audio files, stores their tags in SQLite and
//! searches them with plain text or a small structured query language.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod genre;
pub mod library;
pub mod metadata;
pub mod model;
pub mod query;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log directives used when `RUST_LOG` is unset; one per tracing target root.
const DEFAULT_LOG_FILTER: &str =
    "warn,rolas=info,scanner=info,library=info,db=info,query=info,config=info";

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(log_filter(env.as_deref()))
        .init();

    cli::run_command(&args)
}

/// `RUST_LOG` directives if given and valid, else [`DEFAULT_LOG_FILTER`].
fn log_filter(env: Option<&str>) -> EnvFilter {
    env.filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}
