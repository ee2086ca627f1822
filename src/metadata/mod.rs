//! Audio file tag reading.
//!
//! Uses the lofty crate for format-independent metadata access. Reading is
//! behind the [`MetadataReader`] trait so the scanner can be driven by any
//! source of tags; [`LoftyReader`] is the one used against real files.

use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::path::Path;

use crate::error::{Error, Result};

/// Tag values as found in a file; `None` means the field is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFields {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub track: Option<u32>,
    pub year: Option<i32>,
    pub genre: Option<String>,
}

/// Source of tag values for a single file.
pub trait MetadataReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<TagFields>;
}

/// Reads tags with lofty (ID3v2/ID3v1 for MP3).
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyReader;

impl MetadataReader for LoftyReader {
    fn read(&self, path: &Path) -> Result<TagFields> {
        let tagged_file = Probe::open(path)
            .map_err(|e| Error::metadata(path, format!("failed to open file for probing: {e}")))?
            .read()
            .map_err(|e| Error::metadata(path, format!("failed to read file metadata: {e}")))?;

        // Get the primary tag, or fall back to the first available tag
        let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        else {
            return Ok(TagFields::default());
        };

        Ok(fields_from_tag(tag))
    }
}

fn fields_from_tag(tag: &Tag) -> TagFields {
    let year = tag
        .year()
        .and_then(|y| i32::try_from(y).ok())
        .or_else(|| tag.get_string(&ItemKey::Year).and_then(leading_number))
        .or_else(|| {
            tag.get_string(&ItemKey::RecordingDate)
                .and_then(leading_number)
        });

    TagFields {
        artist: non_empty(tag.artist().map(|s| s.to_string())),
        title: non_empty(tag.title().map(|s| s.to_string())),
        album: non_empty(tag.album().map(|s| s.to_string())),
        track: tag.track(),
        year,
        genre: non_empty(tag.genre().map(|s| s.to_string())),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// First run of ASCII digits in `text`, e.g. `"2010-05-01"` gives 2010 and `"3/12"` gives 3.
pub fn leading_number<T: std::str::FromStr>(text: &str) -> Option<T> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
