//! The song value record.

use serde::{Deserialize, Serialize};

/// Value used for numeric fields the source does not know.
pub const UNKNOWN: i64 = -1;

/// Where a remote song can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMedia {
    /// Audio stream URL.
    pub url: String,
    /// Artwork image URL.
    pub artwork_url: Option<String>,
}

/// A song as reported by the media index, or synthesized for a remote playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Media index identifier.
    pub id: i64,
    /// Song title.
    pub title: String,
    /// Track number, as stored by the index (may encode disc * 1000 + track).
    pub track_number: i32,
    /// Release year.
    pub year: i32,
    /// Duration in milliseconds.
    pub duration_ms: i64,
    /// Absolute file path (or stream URL for remote songs).
    pub path: String,
    /// Last-modified timestamp in seconds since the epoch.
    pub date_modified: i64,
    /// Album identifier.
    pub album_id: i64,
    /// Album name.
    pub album_name: String,
    /// Artist identifier.
    pub artist_id: i64,
    /// Artist name.
    pub artist_name: String,
    /// Set only on songs built from a remote playlist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteMedia>,
}

impl Song {
    /// Sentinel for "no result".
    pub const EMPTY: Self = Self {
        id: UNKNOWN,
        title: String::new(),
        track_number: -1,
        year: -1,
        duration_ms: UNKNOWN,
        path: String::new(),
        date_modified: UNKNOWN,
        album_id: UNKNOWN,
        album_name: String::new(),
        artist_id: UNKNOWN,
        artist_name: String::new(),
        remote: None,
    };

    /// Build a song that lives on a remote server rather than in the local index.
    ///
    /// Fields a playlist listing does not provide are left at [`UNKNOWN`]; they
    /// carry no meaning beyond "not provided".
    pub fn remote(
        id: i64,
        title: impl Into<String>,
        artist_name: impl Into<String>,
        url: impl Into<String>,
        artwork_url: Option<String>,
    ) -> Self {
        let url = url.into();
        Self {
            id,
            title: title.into(),
            path: url.clone(),
            artist_name: artist_name.into(),
            remote: Some(RemoteMedia { url, artwork_url }),
            ..Self::EMPTY
        }
    }

    /// Whether this is the [`Song::EMPTY`] sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Whether this song was synthesized from a remote playlist.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Stream URL for remote songs.
    #[must_use]
    pub fn remote_url(&self) -> Option<&str> {
        self.remote.as_ref().map(|r| r.url.as_str())
    }

    /// Artwork URL for remote songs.
    #[must_use]
    pub fn artwork_url(&self) -> Option<&str> {
        self.remote.as_ref().and_then(|r| r.artwork_url.as_deref())
    }

    /// "Artist - Title" label, falling back to the title alone.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.artist_name.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist_name, self.title)
        }
    }
}

impl Default for Song {
    fn default() -> Self {
        Self::EMPTY
    }
}
