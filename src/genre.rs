//! ID3v1 genre code translation.
//!
//! Old taggers store the genre as a numeric code ("17") or, in ID3v2, as the
//! parenthesised form ("(17)"). [`GenreTranslator`] turns those into names and
//! passes everything else through untouched.

use std::collections::HashMap;

/// The ID3v1 genre list, indexed by code.
pub const ID3V1_GENRES: [&str; 80] = [
    "Blues",
    "Classic Rock",
    "Country",
    "Dance",
    "Disco",
    "Funk",
    "Grunge",
    "Hip-Hop",
    "Jazz",
    "Metal",
    "New Age",
    "Oldies",
    "Other",
    "Pop",
    "R&B",
    "Rap",
    "Reggae",
    "Rock",
    "Techno",
    "Industrial",
    "Alternative",
    "Ska",
    "Death Metal",
    "Pranks",
    "Soundtrack",
    "Euro-Techno",
    "Ambient",
    "Trip-Hop",
    "Vocal",
    "Jazz+Funk",
    "Fusion",
    "Trance",
    "Classical",
    "Instrumental",
    "Acid",
    "House",
    "Game",
    "Sound Clip",
    "Gospel",
    "Noise",
    "AlternRock",
    "Bass",
    "Soul",
    "Punk",
    "Space",
    "Meditative",
    "Instrumental Pop",
    "Instrumental Rock",
    "Ethnic",
    "Gothic",
    "Darkwave",
    "Techno-Industrial",
    "Electronic",
    "Pop-Folk",
    "Eurodance",
    "Dream",
    "Southern Rock",
    "Comedy",
    "Cult",
    "Gangsta",
    "Top 40",
    "Christian Rap",
    "Pop/Funk",
    "Jungle",
    "Native American",
    "Cabaret",
    "New Wave",
    "Psychedelic",
    "Rave",
    "Showtunes",
    "Trailer",
    "Lo-Fi",
    "Tribal",
    "Acid Punk",
    "Acid Jazz",
    "Polka",
    "Retro",
    "Musical",
    "Rock & Roll",
    "Hard Rock",
];

/// Lookup from genre code to name.
///
/// Immutable once built; construct one at startup and share it by reference.
#[derive(Debug, Clone)]
pub struct GenreTranslator {
    names: HashMap<String, &'static str>,
}

impl Default for GenreTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl GenreTranslator {
    pub fn new() -> Self {
        let names = ID3V1_GENRES
            .iter()
            .enumerate()
            .map(|(code, name)| (code.to_string(), *name))
            .collect();
        Self { names }
    }

    /// Translate a genre code into its name.
    ///
    /// Unrecognized input is returned unchanged.
    pub fn translate(&self, code: &str) -> String {
        let trimmed = code.trim();
        let key = trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(trimmed);

        match self.names.get(key) {
            Some(name) => (*name).to_string(),
            None => code.to_string(),
        }
    }
}
