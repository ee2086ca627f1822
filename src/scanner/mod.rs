//! Library scanner: the Discover → Extract → Ingest pipeline.
//!
//! - [`Miner::traverse`] walks the root and lists the matching files.
//! - [`Miner::extract`] reads each file's tags, in order, and sends a
//!   [`Track`] down the "ore" channel.
//! - [`populate`] drains the ore channel into the store and forwards every
//!   newly inserted track on the "accepted" channel.
//!
//! Each stage closes its output channel by dropping the sender when it
//! finishes, which is the only completion signal downstream stages get.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db::{Insertion, Store, StoreError};
use crate::genre::GenreTranslator;
use crate::metadata::{MetadataReader, TagFields};
use crate::model::Track;

/// Files are selected by this suffix (case-sensitive).
pub const DEFAULT_EXTENSION: &str = ".mp3";

/// Outcome of the Extract stage.
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    /// Records sent on the ore channel
    pub extracted: usize,
    /// Files whose tags could not be read, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

/// Outcome of the Ingest stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// New rows, each forwarded on the accepted channel
    pub inserted: usize,
    /// Records dropped because the store already had them
    pub skipped: usize,
}

/// Finds audio files and turns them into [`Track`] records.
pub struct Miner {
    reader: Arc<dyn MetadataReader>,
    genres: Arc<GenreTranslator>,
    extension: String,
}

impl Miner {
    pub fn new(reader: Arc<dyn MetadataReader>, genres: Arc<GenreTranslator>) -> Self {
        Self {
            reader,
            genres,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Recursively list the files under `root` whose name ends with the
    /// configured extension.
    ///
    /// Entries are visited in file-name order. An entry that cannot be read
    /// is logged and skipped; the walk carries on.
    pub fn traverse(&self, root: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            match entry {
                Ok(entry) => {
                    // Compared as bytes so names that are not valid UTF-8 still match
                    let matches = entry
                        .file_name()
                        .as_encoded_bytes()
                        .ends_with(self.extension.as_bytes());
                    if entry.file_type().is_file() && matches {
                        if entry.file_name().to_str().is_none() {
                            debug!(
                                target: "scanner::discover",
                                path = %entry.path().display(),
                                "File name is not valid UTF-8, stored path will be lossy"
                            );
                        }
                        paths.push(entry.into_path());
                    }
                }
                Err(e) => {
                    warn!(
                        target: "scanner::discover",
                        path = ?e.path(),
                        error = %e,
                        "Skipping entry"
                    );
                }
            }
        }

        info!(
            target: "scanner::discover",
            root = %root.display(),
            found = paths.len(),
            "Discovery finished"
        );
        paths
    }

    /// Read tags for `paths` in order and send one record per file on `ore`.
    ///
    /// Blocking; run it on a blocking thread. A file whose tags cannot be
    /// read is skipped and listed in the report. `ore` is closed on return.
    pub fn extract(&self, paths: &[PathBuf], ore: UnboundedSender<Track>) -> ExtractReport {
        let mut report = ExtractReport::default();

        for path in paths {
            match self.reader.read(path) {
                Ok(fields) => {
                    if ore.send(self.build_track(path, fields)).is_err() {
                        debug!(
                            target: "scanner::extract",
                            "Ore channel closed, stopping extraction"
                        );
                        break;
                    }
                    report.extracted += 1;
                }
                Err(e) => {
                    warn!(
                        target: "scanner::extract",
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable file"
                    );
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }

        info!(
            target: "scanner::extract",
            extracted = report.extracted,
            failed = report.failed.len(),
            "Extraction finished"
        );
        report
    }

    /// Build a record from tag values, filling absent fields with defaults.
    pub fn build_track(&self, path: &Path, fields: TagFields) -> Track {
        let mut track = Track::default();

        if let Some(artist) = present(&fields.artist) {
            track.set_artist(artist);
        }
        if let Some(title) = present(&fields.title) {
            track.set_title(title);
        }
        if let Some(album) = present(&fields.album) {
            track.set_album(album);
        }
        if let Some(genre) = present(&fields.genre) {
            track.set_genre(&self.genres.translate(genre));
        }
        if let Some(n) = fields.track {
            track.track = n;
        }
        if let Some(year) = fields.year {
            track.year = year;
        }
        track.set_path(&path.to_string_lossy());

        track
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Ingest records from `ore` into `store`.
///
/// The performer and album of each record are resolved (or created) before
/// the guarded insert. Inserted records get their id and are forwarded on
/// `accepted`; records already present are dropped. If the accepted
/// receiver goes away ingestion still runs to completion.
///
/// # Errors
///
/// The first store failure aborts the stage; both channels are closed.
pub async fn populate(
    store: Store,
    mut ore: UnboundedReceiver<Track>,
    accepted: UnboundedSender<Track>,
) -> Result<IngestReport, StoreError> {
    let mut report = IngestReport::default();
    let mut consumer_gone = false;

    while let Some(mut track) = ore.recv().await {
        let performer_id = match store.exists_performer(&track.artist).await? {
            Some(id) => id,
            None => store.get_or_create_performer(&track.artist).await?,
        };
        let album_dir = track.album_dir();
        let album_id = match store.exists_album(&album_dir, &track.album).await? {
            Some(id) => id,
            None => {
                store
                    .get_or_create_album(&album_dir, &track.album, track.year)
                    .await?
            }
        };

        match store
            .insert_track_if_absent(&track, performer_id, album_id)
            .await?
        {
            Insertion::Inserted(id) => {
                track.assign_id(id);
                report.inserted += 1;
                debug!(target: "scanner::ingest", id, path = %track.path, "Track added to library");
                if !consumer_gone && accepted.send(track).is_err() {
                    consumer_gone = true;
                    debug!(
                        target: "scanner::ingest",
                        "Accepted channel closed, ingesting without notifications"
                    );
                }
            }
            Insertion::AlreadyPresent => {
                report.skipped += 1;
                debug!(target: "scanner::ingest", path = %track.path, "Track already in library");
            }
        }
    }

    info!(
        target: "scanner::ingest",
        inserted = report.inserted,
        skipped = report.skipped,
        "Ingestion finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FixtureReader, mock_track, temp_store, titled, touch_files};
    use tempfile::tempdir;
    use tokio::sync::mpsc::unbounded_channel;

    fn miner(reader: FixtureReader) -> Miner {
        Miner::new(Arc::new(reader), Arc::new(GenreTranslator::new()))
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect()
    }

    #[test]
    fn test_traverse_selects_extension() {
        let dir = tempdir().unwrap();
        touch_files(
            dir.path(),
            &[
                "song.mp3",
                "music.flac",
                "notes.txt",
                "UPPERCASE.MP3", // suffix match is case-sensitive
                "notmp3",
                "sub/track.mp3",
                "sub/deeper/other.mp3",
                "sub/ignore.doc",
            ],
        );
        std::fs::create_dir(dir.path().join("folder.mp3")).unwrap();

        let paths = miner(FixtureReader::new()).traverse(dir.path());

        assert_eq!(names(&paths), vec!["song.mp3", "other.mp3", "track.mp3"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_traverse_keeps_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let latin1 = dir.path().join(OsStr::from_bytes(b"caf\xe9.mp3"));
        std::fs::File::create(&latin1).unwrap();
        touch_files(dir.path(), &["ok.mp3", "caf\u{e9}.txt"]);

        let paths = miner(FixtureReader::new()).traverse(dir.path());

        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&latin1));
        assert!(paths.contains(&dir.path().join("ok.mp3")));
    }

    #[test]
    fn test_traverse_custom_extension() {
        let dir = tempdir().unwrap();
        touch_files(dir.path(), &["a.mp3", "b.flac"]);

        let paths = miner(FixtureReader::new())
            .with_extension(".flac")
            .traverse(dir.path());
        assert_eq!(names(&paths), vec!["b.flac"]);
    }

    #[test]
    fn test_traverse_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let paths = miner(FixtureReader::new()).traverse(&dir.path().join("nope"));
        assert!(paths.is_empty());
    }

    #[test]
    fn test_extract_preserves_order_and_closes_channel() {
        let reader = FixtureReader::new()
            .with("1.mp3", titled("T1"))
            .with("2.mp3", titled("T2"))
            .with("3.mp3", titled("T3"));
        let paths: Vec<PathBuf> = ["/m/1.mp3", "/m/2.mp3", "/m/3.mp3"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let (tx, mut rx) = unbounded_channel();

        let report = miner(reader).extract(&paths, tx);
        assert_eq!(report.extracted, 3);
        assert!(report.failed.is_empty());

        let mut titles = Vec::new();
        while let Some(track) = rx.blocking_recv() {
            titles.push(track.title);
        }
        assert_eq!(titles, vec!["T1", "T2", "T3"]);
    }

    #[test]
    fn test_extract_skips_unreadable_files() {
        let reader = FixtureReader::new()
            .with("1.mp3", titled("T1"))
            .with("3.mp3", titled("T3"));
        let paths: Vec<PathBuf> = ["/m/1.mp3", "/m/2.mp3", "/m/3.mp3"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let (tx, mut rx) = unbounded_channel();

        let report = miner(reader).extract(&paths, tx);
        assert_eq!(report.extracted, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, PathBuf::from("/m/2.mp3"));

        let mut paths_seen = Vec::new();
        while let Some(track) = rx.blocking_recv() {
            paths_seen.push(track.path);
        }
        assert_eq!(paths_seen, vec!["/m/1.mp3", "/m/3.mp3"]);
    }

    #[test]
    fn test_extract_stops_when_ingest_is_gone() {
        let reader = FixtureReader::new().with("1.mp3", titled("T1"));
        let (tx, rx) = unbounded_channel();
        drop(rx);

        let report = miner(reader).extract(&[PathBuf::from("/m/1.mp3")], tx);
        assert_eq!(report.extracted, 0);
    }

    #[test]
    fn test_build_track_defaults() {
        let track = miner(FixtureReader::new())
            .build_track(Path::new("/m/blank.mp3"), TagFields::default());

        assert_eq!(track.artist, "Unknown");
        assert_eq!(track.title, "Unknown");
        assert_eq!(track.album, "Unknown");
        assert_eq!(track.genre, "Unknown");
        assert_eq!(track.track, 0);
        assert_eq!(track.year, 2018);
        assert_eq!(track.path, "/m/blank.mp3");
        assert_eq!(track.id(), 0);
    }

    #[test]
    fn test_build_track_uses_tags() {
        let fields = TagFields {
            artist: Some(" Camelia Jordana ".to_string()),
            title: Some("Non Non Non".to_string()),
            album: Some("".to_string()),
            track: Some(3),
            year: Some(2014),
            genre: Some("(13)".to_string()),
        };
        let track = miner(FixtureReader::new()).build_track(Path::new("/m/cj.mp3"), fields);

        assert_eq!(track.artist, "Camelia Jordana");
        assert_eq!(track.title, "Non Non Non");
        assert_eq!(track.album, "Unknown");
        assert_eq!(track.track, 3);
        assert_eq!(track.year, 2014);
        assert_eq!(track.genre, "Pop");
    }

    #[tokio::test]
    async fn test_populate_forwards_only_new_records() {
        let (store, _dir) = temp_store().await;
        let (ore_tx, ore_rx) = unbounded_channel();
        let (accepted_tx, mut accepted_rx) = unbounded_channel();

        ore_tx.send(mock_track("A", "/m/a.mp3")).unwrap();
        ore_tx.send(mock_track("B", "/m/b.mp3")).unwrap();
        ore_tx.send(mock_track("A", "/m/a.mp3")).unwrap();
        ore_tx.send(mock_track("C", "/m/c.mp3")).unwrap();
        drop(ore_tx);

        let report = populate(store.clone(), ore_rx, accepted_tx).await.unwrap();
        assert_eq!(report, IngestReport { inserted: 3, skipped: 1 });

        let mut accepted = Vec::new();
        while let Some(track) = accepted_rx.recv().await {
            assert!(track.is_persisted());
            accepted.push(track);
        }
        let titles: Vec<&str> = accepted.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        assert!(accepted.windows(2).all(|w| w[0].id() < w[1].id()));
        assert_eq!(store.all_tracks().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_populate_continues_without_consumer() {
        let (store, _dir) = temp_store().await;
        let (ore_tx, ore_rx) = unbounded_channel();
        let (accepted_tx, accepted_rx) = unbounded_channel();
        drop(accepted_rx);

        ore_tx.send(mock_track("A", "/m/a.mp3")).unwrap();
        ore_tx.send(mock_track("B", "/m/b.mp3")).unwrap();
        drop(ore_tx);

        let report = populate(store.clone(), ore_rx, accepted_tx).await.unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(store.all_tracks().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_populate_aborts_on_store_failure() {
        let (store, _dir) = temp_store().await;
        store.close().await;
        let (ore_tx, ore_rx) = unbounded_channel();
        let (accepted_tx, mut accepted_rx) = unbounded_channel();

        ore_tx.send(mock_track("A", "/m/a.mp3")).unwrap();

        let err = populate(store, ore_rx, accepted_tx).await.unwrap_err();
        assert!(matches!(err, StoreError::ConnectionLost(_)));

        // Both channels are released so neither neighbour stage hangs
        assert!(accepted_rx.recv().await.is_none());
        assert!(ore_tx.send(mock_track("B", "/m/b.mp3")).is_err());
    }

    #[tokio::test]
    async fn test_pipeline_emits_in_discovery_order() {
        let (store, _db_dir) = temp_store().await;
        let music = tempdir().unwrap();
        touch_files(music.path(), &["a/p1.mp3", "b/p2.mp3", "c/p3.mp3"]);

        let reader = FixtureReader::new()
            .with("p1.mp3", titled("T1"))
            .with("p2.mp3", titled("T2"))
            .with("p3.mp3", titled("T3"));
        let miner = Arc::new(miner(reader));

        let paths = miner.traverse(music.path());
        assert_eq!(names(&paths), vec!["p1.mp3", "p2.mp3", "p3.mp3"]);

        let (ore_tx, ore_rx) = unbounded_channel();
        let (accepted_tx, mut accepted_rx) = unbounded_channel();

        let extract = {
            let miner = miner.clone();
            tokio::task::spawn_blocking(move || miner.extract(&paths, ore_tx))
        };
        let ingest = tokio::spawn(populate(store.clone(), ore_rx, accepted_tx));

        let mut titles = Vec::new();
        while let Some(track) = accepted_rx.recv().await {
            titles.push(track.title);
        }
        assert_eq!(titles, vec!["T1", "T2", "T3"]);

        assert_eq!(extract.await.unwrap().extracted, 3);
        assert_eq!(ingest.await.unwrap().unwrap().inserted, 3);
        assert!(accepted_rx.recv().await.is_none());
    }
}
