//! Blacklist-aware query filter composition.
//!
//! A [`SongFilter`] is a parameterized `WHERE` clause: an expression with `?`
//! placeholders plus the values bound to them, in order. Every filter starts
//! from [`BASE_SELECTION`], optionally narrowed by a caller predicate, and then
//! gets one `NOT LIKE` exclusion per blacklisted directory.
//!
//! ```rust
//! use gramophone_core::query::{build_filter, BASE_SELECTION};
//!
//! let filter = build_filter(
//!     Some("title LIKE ?"),
//!     Some(["%foo%".to_string()].as_slice()),
//!     &["/sdcard/private".to_string()],
//! );
//! assert_eq!(
//!     filter.expression,
//!     format!("{BASE_SELECTION} AND title LIKE ? AND _data NOT LIKE ?")
//! );
//! assert_eq!(filter.values, vec!["%foo%", "/sdcard/private%"]);
//! ```

use serde::{Deserialize, Serialize};

/// Column names of the audio table.
pub mod columns {
    /// Row identifier.
    pub const ID: &str = "_id";
    /// Song title.
    pub const TITLE: &str = "title";
    /// Track number.
    pub const TRACK: &str = "track";
    /// Release year.
    pub const YEAR: &str = "year";
    /// Duration in milliseconds.
    pub const DURATION: &str = "duration";
    /// Absolute file path.
    pub const DATA: &str = "_data";
    /// Last-modified timestamp.
    pub const DATE_MODIFIED: &str = "date_modified";
    /// Album identifier.
    pub const ALBUM_ID: &str = "album_id";
    /// Album name.
    pub const ALBUM: &str = "album";
    /// Artist identifier.
    pub const ARTIST_ID: &str = "artist_id";
    /// Artist name.
    pub const ARTIST: &str = "artist";
    /// Non-zero when the row is music (not a ringtone, podcast, ...).
    pub const IS_MUSIC: &str = "is_music";
}

/// Predicate applied to every song query: music rows with a non-empty title.
pub const BASE_SELECTION: &str = "is_music=1 AND title != ''";

/// Columns fetched for every song, in the order [`Song`](crate::Song) rows are decoded.
pub const SONG_PROJECTION: [&str; 11] = [
    columns::ID,
    columns::TITLE,
    columns::TRACK,
    columns::YEAR,
    columns::DURATION,
    columns::DATA,
    columns::DATE_MODIFIED,
    columns::ALBUM_ID,
    columns::ALBUM,
    columns::ARTIST_ID,
    columns::ARTIST,
];

/// A filter expression and the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SongFilter {
    /// Expression with `?` placeholders.
    pub expression: String,
    /// Values bound positionally to the placeholders.
    pub values: Vec<String>,
}

impl SongFilter {
    /// The base predicate with nothing bound.
    #[must_use]
    pub fn base() -> Self {
        Self {
            expression: BASE_SELECTION.to_string(),
            values: Vec::new(),
        }
    }

    /// Number of `?` placeholders in the expression.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.expression.matches('?').count()
    }
}

/// Compose the base predicate, an optional caller predicate and the blacklist
/// exclusions into one parameterized filter.
///
/// Caller values come first, followed by one `path%` value per blacklisted
/// path in iteration order. Paths are bound verbatim: `%` and `_` inside a path
/// keep their `LIKE` meaning.
///
/// A blank predicate is dropped, but its values are still forwarded.
pub fn build_filter(
    predicate: Option<&str>,
    values: Option<&[String]>,
    blacklist_paths: &[String],
) -> SongFilter {
    let mut expression = match predicate {
        Some(p) if !p.trim().is_empty() => format!("{BASE_SELECTION} AND {p}"),
        _ => BASE_SELECTION.to_string(),
    };

    let caller_values = values.unwrap_or_default();
    let mut bound = Vec::with_capacity(caller_values.len() + blacklist_paths.len());
    bound.extend_from_slice(caller_values);

    for path in blacklist_paths {
        expression.push_str(" AND ");
        expression.push_str(columns::DATA);
        expression.push_str(" NOT LIKE ?");
        bound.push(format!("{path}%"));
    }

    SongFilter {
        expression,
        values: bound,
    }
}

/// Predicate and value matching songs whose title contains `query`.
#[must_use]
pub fn title_contains(query: &str) -> (String, Vec<String>) {
    (
        format!("{} LIKE ?", columns::TITLE),
        vec![format!("%{query}%")],
    )
}

/// Predicate and value matching a single song id.
#[must_use]
pub fn id_equals(id: i64) -> (String, Vec<String>) {
    (format!("{}=?", columns::ID), vec![id.to_string()])
}

/// Song list orderings offered to the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Title, A to Z.
    #[default]
    TitleAsc,
    /// Title, Z to A.
    TitleDesc,
    /// Artist name, then title.
    Artist,
    /// Album name, then track number.
    Album,
    /// Newest release first.
    YearDesc,
    /// Most recently modified first.
    DateModifiedDesc,
}

impl SortOrder {
    /// The `ORDER BY` expression for this ordering.
    #[must_use]
    pub const fn expression(self) -> &'static str {
        match self {
            Self::TitleAsc => "title COLLATE NOCASE ASC",
            Self::TitleDesc => "title COLLATE NOCASE DESC",
            Self::Artist => "artist COLLATE NOCASE ASC, title COLLATE NOCASE ASC",
            Self::Album => "album COLLATE NOCASE ASC, track ASC",
            Self::YearDesc => "year DESC",
            Self::DateModifiedDesc => "date_modified DESC",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TitleAsc => write!(f, "Title (A-Z)"),
            Self::TitleDesc => write!(f, "Title (Z-A)"),
            Self::Artist => write!(f, "Artist"),
            Self::Album => write!(f, "Album"),
            Self::YearDesc => write!(f, "Year"),
            Self::DateModifiedDesc => write!(f, "Date modified"),
        }
    }
}
