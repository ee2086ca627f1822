//! Library scanning and listing commands.

use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

use super::{open_store, print_tracks, track_line};
use crate::config::Config;
use crate::genre::GenreTranslator;
use crate::library;
use crate::metadata::LoftyReader;
use crate::scanner::Miner;

/// Scan a directory and print each track as it is added
pub fn cmd_scan(
    rt: &Runtime,
    config: &Config,
    db: Option<&Path>,
    root: Option<&Path>,
    extension: Option<&str>,
) -> anyhow::Result<()> {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => config.library_root()?,
    };
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }
    let extension = extension.unwrap_or(config.library.extension.as_str());

    rt.block_on(async {
        let store = open_store(config, db).await?;
        let miner = Miner::new(Arc::new(LoftyReader), Arc::new(GenreTranslator::new()))
            .with_extension(extension);

        println!("Scanning directory: {}", root.display());
        let mut scan = library::scan_library(store.clone(), Arc::new(miner), root);

        {
            let mut tracks = std::pin::pin!(scan.tracks());
            while let Some(track) = tracks.next().await {
                println!("{}", track_line(&track));
            }
        }

        let summary = scan.finish().await;
        store.close().await;
        let summary = summary?;
        println!(
            "\nScan complete. {} file(s) found: {} added, {} already in library, {} unreadable.",
            summary.discovered, summary.inserted, summary.skipped, summary.failed
        );
        Ok(())
    })
}

/// List all tracks in the database
pub fn cmd_list(
    rt: &Runtime,
    config: &Config,
    db: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        let tracks = store.all_tracks().await?;
        print_tracks(&tracks, json)
    })
}
