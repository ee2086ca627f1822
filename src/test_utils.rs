//! Test utilities and fixtures for rolas tests.
//!
//! This module provides common test helpers, mock factories, and
//! database utilities to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use rolas::test_utils::{temp_store, mock_track};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (store, _dir) = temp_store().await;
//!     let track = mock_track("Title", "/music/a.mp3");
//!     // ... test logic
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::db::Store;
use crate::error::{Error, Result};
use crate::metadata::{MetadataReader, TagFields};
use crate::model::Track;

/// Creates a temporary store for testing.
///
/// The database lives in a temporary directory that is removed when the
/// returned `TempDir` is dropped. Keep it alive for the duration of the test.
pub async fn temp_store() -> (Store, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");

    let store = Store::open(&crate::db::db_url(Some(db_path.as_path())))
        .await
        .expect("Failed to initialize test database");

    (store, dir)
}

/// A track with fixed artist/album/genre and the given title and path.
///
/// Artist "Test Artist", album "Test Album", genre "Rock", track 1, year 2000.
pub fn mock_track(title: &str, path: &str) -> Track {
    let mut track = Track::default();
    track.set_artist("Test Artist");
    track.set_album("Test Album");
    track.set_genre("Rock");
    track.set_title(title);
    track.set_path(path);
    track.track = 1;
    track.year = 2000;
    track
}

/// Tag values for a fixture file with only a title.
pub fn titled(title: &str) -> TagFields {
    TagFields {
        artist: Some("Fixture Artist".to_string()),
        title: Some(title.to_string()),
        album: Some("Fixture Album".to_string()),
        ..TagFields::default()
    }
}

/// In-memory [`MetadataReader`] keyed by file name.
///
/// Files not registered are treated as unreadable.
#[derive(Debug, Default)]
pub struct FixtureReader {
    tags: HashMap<String, TagFields>,
}

impl FixtureReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, fields: TagFields) -> Self {
        self.tags.insert(file_name.to_string(), fields);
        self
    }
}

impl MetadataReader for FixtureReader {
    fn read(&self, path: &Path) -> Result<TagFields> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        self.tags
            .get(name)
            .cloned()
            .ok_or_else(|| Error::metadata(path, "unreadable fixture"))
    }
}

/// Create empty files (and parent directories) under `root`.
pub fn touch_files(root: &Path, relative: &[&str]) -> Vec<PathBuf> {
    relative
        .iter()
        .map(|rel| {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
            }
            std::fs::File::create(&path).expect("Failed to create fixture file");
            path
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_store_creates_working_database() {
        let (store, _dir) = temp_store().await;
        assert!(store.all_tracks().await.unwrap().is_empty());
    }

    #[test]
    fn test_mock_track_defaults() {
        let track = mock_track("Test Track", "/test/song.mp3");
        assert_eq!(track.title, "Test Track");
        assert_eq!(track.artist, "Test Artist");
        assert_eq!(track.album, "Test Album");
        assert_eq!(track.path, "/test/song.mp3");
        assert_eq!(track.id(), 0);
    }

    #[test]
    fn test_fixture_reader() {
        let reader = FixtureReader::new().with("a.mp3", titled("A"));
        let fields = reader.read(Path::new("/x/a.mp3")).unwrap();
        assert_eq!(fields.title.as_deref(), Some("A"));
        assert!(reader.read(Path::new("/x/b.mp3")).is_err());
    }

    #[test]
    fn test_touch_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = touch_files(dir.path(), &["a.mp3", "sub/b.mp3"]);
        assert!(paths.iter().all(|p| p.exists()));
    }
}
