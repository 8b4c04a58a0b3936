//! SQLite-backed media index.
//!
//! Stores song rows in an `audio` table whose columns match the names used by
//! [`crate::query`], so filters built there run unchanged.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, params, params_from_iter};
use tracing::{debug, info};

use crate::error::IndexError;
use crate::index::{EntityKind, MediaIndex, MediaQuery, MediaRow, MediaValue};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS audio (
    _id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL DEFAULT '',
    track INTEGER NOT NULL DEFAULT 0,
    year INTEGER NOT NULL DEFAULT 0,
    duration INTEGER NOT NULL DEFAULT 0,
    _data TEXT NOT NULL UNIQUE,
    date_modified INTEGER NOT NULL DEFAULT 0,
    album_id INTEGER NOT NULL DEFAULT 0,
    album TEXT NOT NULL DEFAULT '',
    artist_id INTEGER NOT NULL DEFAULT 0,
    artist TEXT NOT NULL DEFAULT '',
    is_music INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_audio_data ON audio(_data);
";

/// A track to add to the index.
#[derive(Debug, Clone, Default)]
pub struct NewTrack {
    /// Song title.
    pub title: String,
    /// Track number.
    pub track_number: i32,
    /// Release year.
    pub year: i32,
    /// Duration in milliseconds.
    pub duration_ms: i64,
    /// Absolute file path.
    pub path: String,
    /// Last-modified timestamp.
    pub date_modified: i64,
    /// Album identifier.
    pub album_id: i64,
    /// Album name.
    pub album_name: String,
    /// Artist identifier.
    pub artist_id: i64,
    /// Artist name.
    pub artist_name: String,
    /// Whether the file is music rather than a ringtone or notification sound.
    pub is_music: bool,
}

impl NewTrack {
    /// A music track with the given title and path.
    pub fn new(title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            is_music: true,
            ..Self::default()
        }
    }

    /// Set the artist.
    #[must_use]
    pub fn with_artist(mut self, id: i64, name: impl Into<String>) -> Self {
        self.artist_id = id;
        self.artist_name = name.into();
        self
    }

    /// Set the album.
    #[must_use]
    pub fn with_album(mut self, id: i64, name: impl Into<String>) -> Self {
        self.album_id = id;
        self.album_name = name.into();
        self
    }

    /// Set the release year.
    #[must_use]
    pub const fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    /// Mark the file as non-music.
    #[must_use]
    pub const fn not_music(mut self) -> Self {
        self.is_music = false;
        self
    }
}

fn map_sqlite_error(e: rusqlite::Error) -> IndexError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _) => match err.code {
            ErrorCode::PermissionDenied
            | ErrorCode::AuthorizationForStatementDenied
            | ErrorCode::ReadOnly => IndexError::PermissionDenied(e.to_string()),
            ErrorCode::CannotOpen | ErrorCode::NotADatabase => {
                IndexError::Unavailable(e.to_string())
            }
            _ => IndexError::Query(e.to_string()),
        },
        other => IndexError::Query(other.to_string()),
    }
}

fn to_media_value(value: ValueRef<'_>) -> MediaValue {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => MediaValue::Null,
        ValueRef::Integer(i) => MediaValue::Integer(i),
        ValueRef::Real(f) => MediaValue::Integer(f as i64),
        ValueRef::Text(t) => MediaValue::Text(String::from_utf8_lossy(t).into_owned()),
    }
}

const fn table_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Audio => "audio",
    }
}

/// Media index stored in a SQLite database.
pub struct SqliteMediaIndex {
    conn: Mutex<Connection>,
}

impl SqliteMediaIndex {
    /// Open (or create) an index database at `path`.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(path).map_err(map_sqlite_error)?;
        info!("Opened media index at {}", path.display());
        Self::from_connection(conn)
    }

    /// Create a throwaway in-memory index.
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_error)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, IndexError> {
        conn.execute_batch(SCHEMA).map_err(map_sqlite_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, IndexError> {
        self.conn
            .lock()
            .map_err(|_| IndexError::Unavailable("index connection poisoned".to_string()))
    }

    /// Add a track, returning its id. Re-adding a path replaces the old row.
    pub fn insert(&self, track: &NewTrack) -> Result<i64, IndexError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO audio
                (title, track, year, duration, _data, date_modified,
                 album_id, album, artist_id, artist, is_music)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                track.title,
                track.track_number,
                track.year,
                track.duration_ms,
                track.path,
                track.date_modified,
                track.album_id,
                track.album_name,
                track.artist_id,
                track.artist_name,
                i64::from(track.is_music),
            ],
        )
        .map_err(map_sqlite_error)?;
        let id = conn.last_insert_rowid();
        debug!("Indexed {} as {}", track.path, id);
        Ok(id)
    }

    /// Number of rows in the index, music or not.
    pub fn len(&self) -> Result<usize, IndexError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM audio", [], |row| row.get(0))
            .map_err(map_sqlite_error)?;
        Ok(count as usize)
    }

    /// Whether the index has no rows.
    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }
}

impl MediaIndex for SqliteMediaIndex {
    fn query(&self, query: &MediaQuery) -> Result<Vec<MediaRow>, IndexError> {
        let mut sql = format!(
            "SELECT {} FROM {}",
            query.projection.join(", "),
            table_name(query.kind)
        );
        if !query.filter.expression.trim().is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&query.filter.expression);
        }
        if !query.sort_order.trim().is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&query.sort_order);
        }
        debug!(
            "Media index query: {} ({} values)",
            sql,
            query.filter.values.len()
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite_error)?;
        let width = query.projection.len();
        let rows = stmt
            .query_map(params_from_iter(query.filter.values.iter()), |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(to_media_value))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map(MediaRow)
            })
            .map_err(map_sqlite_error)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_sqlite_error)
    }
}

impl std::fmt::Debug for SqliteMediaIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMediaIndex").finish_non_exhaustive()
    }
}
