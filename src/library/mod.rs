//! Scan orchestration and search dispatch.
//!
//! [`scan_library`] wires the three scanner stages together on the tokio
//! runtime and hands back the accepted channel so the caller can show
//! tracks as they land in the store.

use std::path::PathBuf;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::db::Store;
use crate::error::{Result, ResultExt};
use crate::model::Track;
use crate::query::{Parsed, Parser};
use crate::scanner::{self, Miner};

/// Totals for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub discovered: usize,
    pub extracted: usize,
    pub failed: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// A running scan.
///
/// Tracks arrive in discovery order, each after it has been stored and
/// given its id. The channel closes when ingestion is over.
pub struct LibraryScan {
    accepted: UnboundedReceiver<Track>,
    handle: JoinHandle<Result<ScanSummary>>,
}

impl LibraryScan {
    /// Next newly stored track, or `None` once the scan has finished.
    pub async fn next_track(&mut self) -> Option<Track> {
        self.accepted.recv().await
    }

    /// Accepted tracks as a stream, ending when ingestion is over.
    pub fn tracks(&mut self) -> impl Stream<Item = Track> + '_ {
        futures::stream::unfold(self, |scan| async move {
            scan.next_track().await.map(|track| (track, scan))
        })
    }

    /// Wait for every stage to finish.
    ///
    /// Tracks not yet taken from the channel are discarded; they are
    /// already in the store.
    pub async fn finish(self) -> Result<ScanSummary> {
        drop(self.accepted);
        self.handle.await?
    }
}

/// Start scanning `root` into `store`.
///
/// Must be called from within a tokio runtime. Discovery runs first on a
/// blocking thread, then extraction (blocking) and ingestion (async) run
/// concurrently, connected by the ore channel.
pub fn scan_library(store: Store, miner: Arc<Miner>, root: PathBuf) -> LibraryScan {
    let (accepted_tx, accepted) = unbounded_channel();

    let handle = tokio::spawn(async move {
        info!(target: "library::scan", root = %root.display(), "Starting library scan");

        let paths = {
            let miner = miner.clone();
            tokio::task::spawn_blocking(move || miner.traverse(&root)).await?
        };
        let discovered = paths.len();

        let (ore_tx, ore_rx) = unbounded_channel();
        let extract = tokio::task::spawn_blocking(move || miner.extract(&paths, ore_tx));

        // Ingest runs here; if it fails the ore receiver is dropped and
        // extraction stops at its next send.
        let ingested = scanner::populate(store, ore_rx, accepted_tx).await;
        let extracted = extract.await?;
        let ingested = ingested.with_context("ingesting scanned tracks")?;

        let summary = ScanSummary {
            discovered,
            extracted: extracted.extracted,
            failed: extracted.failed.len(),
            inserted: ingested.inserted,
            skipped: ingested.skipped,
        };
        info!(
            target: "library::scan",
            discovered = summary.discovered,
            inserted = summary.inserted,
            skipped = summary.skipped,
            failed = summary.failed,
            "Library scan finished"
        );
        Ok(summary)
    });

    LibraryScan { accepted, handle }
}

/// Ids of the tracks matching `text`.
///
/// Structured queries run as a filter; anything else is a substring search
/// over performer, album, title and genre.
pub async fn search(store: &Store, parser: &Parser, text: &str) -> Result<Vec<i64>> {
    let ids = match parser.parse(text) {
        Parsed::Filter(filter) => {
            debug!(target: "library::search", clause = %filter.clause, "Filter search");
            store.query_filter(&filter).await?
        }
        Parsed::Plain(plain) => {
            debug!(target: "library::search", text = %plain, "Simple search");
            store.query_simple(&plain).await?
        }
    };
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreError;
    use crate::error::Error;
    use crate::genre::GenreTranslator;
    use crate::metadata::TagFields;
    use crate::test_utils::{FixtureReader, temp_store, titled, touch_files};
    use futures::StreamExt;
    use tempfile::tempdir;

    fn fixture_miner() -> Arc<Miner> {
        let reader = FixtureReader::new()
            .with("01.mp3", titled("T1"))
            .with("02.mp3", titled("T2"))
            .with("03.mp3", titled("T3"));
        Arc::new(Miner::new(Arc::new(reader), Arc::new(GenreTranslator::new())))
    }

    #[tokio::test]
    async fn test_scan_emits_tracks_in_order() {
        let (store, _db) = temp_store().await;
        let music = tempdir().unwrap();
        touch_files(music.path(), &["01.mp3", "02.mp3", "03.mp3", "cover.jpg"]);

        let mut scan = scan_library(store.clone(), fixture_miner(), music.path().to_path_buf());

        let mut titles = Vec::new();
        while let Some(track) = scan.next_track().await {
            assert!(track.id() > 0);
            titles.push(track.title);
        }
        assert_eq!(titles, vec!["T1", "T2", "T3"]);

        let summary = scan.finish().await.unwrap();
        assert_eq!(
            summary,
            ScanSummary {
                discovered: 3,
                extracted: 3,
                failed: 0,
                inserted: 3,
                skipped: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_rescan_inserts_nothing() {
        let (store, _db) = temp_store().await;
        let music = tempdir().unwrap();
        touch_files(music.path(), &["01.mp3", "02.mp3", "03.mp3"]);

        let first = scan_library(store.clone(), fixture_miner(), music.path().to_path_buf());
        assert_eq!(first.finish().await.unwrap().inserted, 3);

        let mut second = scan_library(store.clone(), fixture_miner(), music.path().to_path_buf());
        let tracks: Vec<Track> = second.tracks().collect().await;
        assert!(tracks.is_empty());
        assert_eq!(second.finish().await.unwrap().skipped, 3);
        assert_eq!(store.all_tracks().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_scan_counts_unreadable_files() {
        let (store, _db) = temp_store().await;
        let music = tempdir().unwrap();
        touch_files(music.path(), &["01.mp3", "broken.mp3", "03.mp3"]);

        let scan = scan_library(store.clone(), fixture_miner(), music.path().to_path_buf());
        let summary = scan.finish().await.unwrap();

        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.inserted, 2);
    }

    #[tokio::test]
    async fn test_scan_missing_root_finishes_empty() {
        let (store, _db) = temp_store().await;
        let music = tempdir().unwrap();

        let mut scan = scan_library(store, fixture_miner(), music.path().join("absent"));
        assert!(scan.next_track().await.is_none());
        assert_eq!(scan.finish().await.unwrap(), ScanSummary::default());
    }

    #[tokio::test]
    async fn test_scan_reports_store_failure() {
        let (store, _db) = temp_store().await;
        let music = tempdir().unwrap();
        touch_files(music.path(), &["01.mp3", "02.mp3", "03.mp3"]);
        store.close().await;

        let mut scan = scan_library(store, fixture_miner(), music.path().to_path_buf());
        assert!(scan.next_track().await.is_none());

        let err = scan.finish().await.unwrap_err();
        match err {
            Error::WithContext { source, .. } => assert!(matches!(
                *source,
                Error::Store(StoreError::ConnectionLost(_))
            )),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_search_dispatch() {
        let (store, _db) = temp_store().await;
        let music = tempdir().unwrap();
        touch_files(music.path(), &["a.mp3", "b.mp3"]);

        let reader = FixtureReader::new()
            .with(
                "a.mp3",
                TagFields {
                    artist: Some("Daft Punk".to_string()),
                    title: Some("Around the World".to_string()),
                    album: Some("Homework".to_string()),
                    year: Some(1997),
                    ..TagFields::default()
                },
            )
            .with(
                "b.mp3",
                TagFields {
                    artist: Some("Stromae".to_string()),
                    title: Some("Papaoutai".to_string()),
                    album: Some("Racine Carrée".to_string()),
                    year: Some(2013),
                    ..TagFields::default()
                },
            );
        let miner = Arc::new(Miner::new(Arc::new(reader), Arc::new(GenreTranslator::new())));
        scan_library(store.clone(), miner, music.path().to_path_buf())
            .finish()
            .await
            .unwrap();

        let tracks = store.all_tracks().await.unwrap();
        let daft = tracks.iter().find(|t| t.artist == "Daft Punk").unwrap().id();
        let stromae = tracks.iter().find(|t| t.artist == "Stromae").unwrap().id();

        let parser = Parser::new();
        assert_eq!(search(&store, &parser, "punk").await.unwrap(), vec![daft]);
        assert_eq!(
            search(&store, &parser, "*~**AR*=Stromae").await.unwrap(),
            vec![stromae]
        );
        assert_eq!(
            search(&store, &parser, "*~**YE*<2000 || *TI*~pap").await.unwrap(),
            vec![daft, stromae]
        );
        assert!(
            search(&store, &parser, "*~**YE*>2020")
                .await
                .unwrap()
                .is_empty()
        );
    }
}
