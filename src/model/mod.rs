//! Core data models for the music library.
//!
//! Defines the primary entities: [`Track`], [`Performer`], [`Person`],
//! [`Group`] and [`Album`]. These are derived from SQLx for database mapping.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `performers` - Named acts with unique names, classified through `types`
//! - `persons` / `groups` - Details of classified performers, joined by `in_group`
//! - `albums` - Albums keyed by (directory, name)
//! - `rolas` - Individual audio files with metadata

use serde::Serialize;
use sqlx::FromRow;
use std::path::Path;

/// Placeholder for any text tag that is absent.
pub const UNKNOWN: &str = "Unknown";

/// Year assigned when a file carries no usable year.
pub const DEFAULT_YEAR: i32 = 2018;

/// One song's metadata plus its store identity.
///
/// `id` is 0 until the record is persisted; afterwards it is the external
/// identity and cannot be reassigned.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Track {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub track: u32,
    pub year: i32,
    pub genre: String,
    /// Filesystem location, unique per physical file
    pub path: String,
    id: i64,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            artist: UNKNOWN.to_string(),
            title: UNKNOWN.to_string(),
            album: UNKNOWN.to_string(),
            track: 0,
            year: DEFAULT_YEAR,
            genre: UNKNOWN.to_string(),
            path: UNKNOWN.to_string(),
            id: 0,
        }
    }
}

impl Track {
    /// Store identity, 0 when not yet persisted.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// Record the identity assigned by the store.
    ///
    /// Returns `false` and leaves the record untouched if it already has one.
    pub fn assign_id(&mut self, id: i64) -> bool {
        if self.is_persisted() {
            tracing::warn!(
                target: "model",
                current = self.id,
                rejected = id,
                "Track already persisted"
            );
            return false;
        }
        self.id = id;
        true
    }

    pub fn set_artist(&mut self, artist: &str) {
        self.artist = artist.trim().to_string();
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.trim().to_string();
    }

    pub fn set_album(&mut self, album: &str) {
        self.album = album.trim().to_string();
    }

    pub fn set_genre(&mut self, genre: &str) {
        self.genre = genre.trim().to_string();
    }

    pub fn set_path(&mut self, path: &str) {
        self.path = path.trim().to_string();
    }

    /// Directory holding the file; together with the album name it identifies the album.
    pub fn album_dir(&self) -> String {
        Path::new(&self.path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Classification of a performer, matching the rows of the `types` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PerformerType {
    Person = 0,
    Group = 1,
    Unknown = 2,
}

impl PerformerType {
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Unrecognized codes map to `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Person,
            1 => Self::Group,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for PerformerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Person => "Person",
            Self::Group => "Group",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for PerformerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "person" => Ok(Self::Person),
            "group" => Ok(Self::Group),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown performer type: {other}")),
        }
    }
}

/// A named act, initially of unknown kind.
#[derive(Debug, Clone, Serialize)]
pub struct Performer {
    pub id: i64,
    pub kind: PerformerType,
    /// Performer name (unique)
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Person {
    #[sqlx(rename = "id_person")]
    pub id: i64,
    pub stage_name: String,
    pub real_name: String,
    pub birth_date: String,
    pub death_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Group {
    #[sqlx(rename = "id_group")]
    pub id: i64,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Album {
    #[sqlx(rename = "id_album")]
    pub id: i64,
    /// Directory the album's files live in
    pub path: String,
    pub name: String,
    pub year: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_track_uses_placeholders() {
        let track = Track::default();
        assert_eq!(track.artist, "Unknown");
        assert_eq!(track.title, "Unknown");
        assert_eq!(track.album, "Unknown");
        assert_eq!(track.genre, "Unknown");
        assert_eq!(track.path, "Unknown");
        assert_eq!(track.track, 0);
        assert_eq!(track.year, 2018);
        assert_eq!(track.id(), 0);
        assert!(!track.is_persisted());
    }

    #[test]
    fn test_setters_trim_whitespace() {
        let mut track = Track::default();
        track.set_artist("  Mark Ronson ");
        track.set_title("Lose It (In the End)\n");
        track.set_album("\tRecord Collection");
        track.set_genre(" Alternative ");
        track.set_path(" /Music/Mark Ronson/Record Collection/02.mp3 ");

        assert_eq!(track.artist, "Mark Ronson");
        assert_eq!(track.title, "Lose It (In the End)");
        assert_eq!(track.album, "Record Collection");
        assert_eq!(track.genre, "Alternative");
        assert_eq!(track.path, "/Music/Mark Ronson/Record Collection/02.mp3");
    }

    #[test]
    fn test_id_is_assigned_once() {
        let mut track = Track::default();
        assert!(track.assign_id(7));
        assert!(!track.assign_id(9));
        assert_eq!(track.id(), 7);
    }

    #[test]
    fn test_album_dir() {
        let track = Track {
            path: "/music/Band/Album/01.mp3".to_string(),
            ..Track::default()
        };
        assert_eq!(track.album_dir(), "/music/Band/Album");
    }

    #[test]
    fn test_performer_type_codes() {
        assert_eq!(PerformerType::from_code(0), PerformerType::Person);
        assert_eq!(PerformerType::from_code(1), PerformerType::Group);
        assert_eq!(PerformerType::from_code(2), PerformerType::Unknown);
        assert_eq!(PerformerType::from_code(99), PerformerType::Unknown);
        assert_eq!(PerformerType::Group.code(), 1);
        assert_eq!("Person".parse::<PerformerType>(), Ok(PerformerType::Person));
        assert!("band".parse::<PerformerType>().is_err());
    }
}
