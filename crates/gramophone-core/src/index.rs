//! Media index abstraction.
//!
//! The media index is the service that actually stores song rows: on a phone
//! this is the OS media store, on a desktop the bundled
//! [`SqliteMediaIndex`](crate::sqlite::SqliteMediaIndex). The loader only
//! depends on the [`MediaIndex`] trait so it can be tested without either.

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::query::{SONG_PROJECTION, SongFilter, SortOrder};
use crate::song::Song;

/// Kind of entity a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Audio files.
    #[default]
    Audio,
}

/// A single query against the media index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaQuery {
    /// Entity kind to query.
    pub kind: EntityKind,
    /// Columns to return, in order.
    pub projection: Vec<&'static str>,
    /// Parameterized filter.
    pub filter: SongFilter,
    /// `ORDER BY` expression; empty for index order.
    pub sort_order: String,
}

impl MediaQuery {
    /// Query audio rows with the song projection.
    #[must_use]
    pub fn songs(filter: SongFilter, sort_order: SortOrder) -> Self {
        Self {
            kind: EntityKind::Audio,
            projection: SONG_PROJECTION.to_vec(),
            filter,
            sort_order: sort_order.expression().to_string(),
        }
    }
}

/// One cell of a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaValue {
    /// SQL NULL.
    Null,
    /// Integer cell.
    Integer(i64),
    /// Text cell.
    Text(String),
}

/// A result row, positionally aligned with the query projection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaRow(pub Vec<MediaValue>);

impl MediaRow {
    fn cell(&self, column: usize) -> Result<&MediaValue, IndexError> {
        self.0.get(column).ok_or_else(|| IndexError::Malformed {
            column,
            reason: format!("row has only {} columns", self.0.len()),
        })
    }

    /// Integer at `column`; NULL reads as -1.
    pub fn integer(&self, column: usize) -> Result<i64, IndexError> {
        match self.cell(column)? {
            MediaValue::Integer(v) => Ok(*v),
            MediaValue::Null => Ok(-1),
            MediaValue::Text(t) => t.trim().parse().map_err(|_| IndexError::Malformed {
                column,
                reason: format!("expected integer, found '{t}'"),
            }),
        }
    }

    /// Integer at `column` that must fit in an `i32`; NULL reads as -1.
    pub fn small_integer(&self, column: usize) -> Result<i32, IndexError> {
        let value = self.integer(column)?;
        i32::try_from(value).map_err(|_| IndexError::Malformed {
            column,
            reason: format!("integer {value} out of range"),
        })
    }

    /// Text at `column`; NULL reads as an empty string.
    pub fn text(&self, column: usize) -> Result<String, IndexError> {
        match self.cell(column)? {
            MediaValue::Text(t) => Ok(t.clone()),
            MediaValue::Null => Ok(String::new()),
            MediaValue::Integer(v) => Ok(v.to_string()),
        }
    }
}

impl TryFrom<&MediaRow> for Song {
    type Error = IndexError;

    /// Decode a row fetched with [`SONG_PROJECTION`].
    fn try_from(row: &MediaRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.integer(0)?,
            title: row.text(1)?,
            track_number: row.small_integer(2)?,
            year: row.small_integer(3)?,
            duration_ms: row.integer(4)?,
            path: row.text(5)?,
            date_modified: row.integer(6)?,
            album_id: row.integer(7)?,
            album_name: row.text(8)?,
            artist_id: row.integer(9)?,
            artist_name: row.text(10)?,
            remote: None,
        })
    }
}

/// A store of song rows that can answer parameterized queries.
#[cfg_attr(test, mockall::automock)]
pub trait MediaIndex: Send + Sync {
    /// Run a query and return the matching rows in the requested order.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::PermissionDenied`] or [`IndexError::Unavailable`]
    /// when the index cannot be read at all, and other variants for failed
    /// queries.
    fn query(&self, query: &MediaQuery) -> Result<Vec<MediaRow>, IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_row() -> MediaRow {
        MediaRow(vec![
            MediaValue::Integer(5),
            MediaValue::Text("Title".to_string()),
            MediaValue::Integer(3),
            MediaValue::Integer(2001),
            MediaValue::Integer(215_000),
            MediaValue::Text("/music/a.mp3".to_string()),
            MediaValue::Integer(1_700_000_000),
            MediaValue::Integer(9),
            MediaValue::Text("Album".to_string()),
            MediaValue::Integer(11),
            MediaValue::Text("Artist".to_string()),
        ])
    }

    #[test]
    fn test_decode_song_row() {
        let song = Song::try_from(&full_row()).expect("decode");
        assert_eq!(song.id, 5);
        assert_eq!(song.title, "Title");
        assert_eq!(song.track_number, 3);
        assert_eq!(song.year, 2001);
        assert_eq!(song.duration_ms, 215_000);
        assert_eq!(song.path, "/music/a.mp3");
        assert_eq!(song.album_name, "Album");
        assert_eq!(song.artist_id, 11);
        assert!(!song.is_remote());
    }

    #[test]
    fn test_decode_nulls() {
        let mut row = full_row();
        row.0[3] = MediaValue::Null;
        row.0[8] = MediaValue::Null;
        let song = Song::try_from(&row).expect("decode");
        assert_eq!(song.year, -1);
        assert_eq!(song.album_name, "");
    }

    #[test]
    fn test_decode_short_row_fails() {
        let mut row = full_row();
        row.0.truncate(4);
        let err = Song::try_from(&row).expect_err("should fail");
        assert!(matches!(err, IndexError::Malformed { column: 4, .. }));
    }

    #[test]
    fn test_decode_bad_integer_fails() {
        let mut row = full_row();
        row.0[0] = MediaValue::Text("abc".to_string());
        let err = Song::try_from(&row).expect_err("should fail");
        assert!(matches!(err, IndexError::Malformed { column: 0, .. }));
    }

    #[test]
    fn test_decode_out_of_range_year_fails() {
        let mut row = full_row();
        row.0[3] = MediaValue::Integer(i64::from(i32::MAX) + 1);
        let err = Song::try_from(&row).expect_err("should fail");
        assert!(matches!(err, IndexError::Malformed { column: 3, .. }));

        let mut row = full_row();
        row.0[2] = MediaValue::Text("-9999999999".to_string());
        let err = Song::try_from(&row).expect_err("should fail");
        assert!(matches!(err, IndexError::Malformed { column: 2, .. }));
    }

    #[test]
    fn test_media_query_songs() {
        let query = MediaQuery::songs(SongFilter::base(), SortOrder::YearDesc);
        assert_eq!(query.kind, EntityKind::Audio);
        assert_eq!(query.projection.len(), 11);
        assert_eq!(query.sort_order, "year DESC");
    }
}
