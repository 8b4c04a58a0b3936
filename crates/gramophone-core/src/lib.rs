//! `Gramophone` Core Library
//!
//! This crate provides the core functionality for the `Gramophone` music player:
//! - Blacklist-aware song queries against a media index
//! - A SQLite-backed media index for desktop use
//! - Remote playlist fetching
//! - Cancellable, bounded-concurrency song downloads
//! - Application configuration and logging
//!
//! # Querying songs
//!
//! ```rust
//! use gramophone_core::{MemoryBlacklist, SongLoader, SqliteMediaIndex};
//! use gramophone_core::sqlite::NewTrack;
//!
//! # fn main() -> gramophone_core::Result<()> {
//! let index = SqliteMediaIndex::open_in_memory()?;
//! index.insert(&NewTrack::new("Kept", "/music/kept.mp3"))?;
//! index.insert(&NewTrack::new("Hidden", "/music/private/hidden.mp3"))?;
//!
//! let loader = SongLoader::new(index, MemoryBlacklist::new(["/music/private"]));
//! let songs = loader.all_songs()?;
//! assert_eq!(songs.len(), 1);
//! assert_eq!(songs[0].title, "Kept");
//! # Ok(())
//! # }
//! ```

pub mod blacklist;
pub mod config;
pub mod download;
pub mod error;
pub mod index;
pub mod loader;
pub mod logging;
pub mod query;
pub mod remote;
pub mod song;
pub mod sqlite;

pub use blacklist::{BlacklistStore, FileBlacklistStore, MemoryBlacklist};
pub use config::{AppConfig, ConfigManager, DownloadConfig, RemoteConfig};
pub use download::{
    DownloadEvent, DownloadHandle, DownloadId, DownloadManager, DownloadOutcome, DownloadRequest,
    sanitize_filename,
};
pub use error::{DownloadError, Error, IndexError, Result};
pub use index::{EntityKind, MediaIndex, MediaQuery, MediaRow, MediaValue};
pub use loader::SongLoader;
pub use logging::{LogRotation, LoggingConfig, LoggingError, LoggingGuard};
pub use query::{BASE_SELECTION, SONG_PROJECTION, SongFilter, SortOrder, build_filter};
pub use remote::{RemotePlaylistClient, parse_playlist};
pub use song::{RemoteMedia, Song};
pub use sqlite::SqliteMediaIndex;
