//! End-to-end tests for song loading against a real SQLite index.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use gramophone_core::sqlite::NewTrack;
use gramophone_core::{
    AppConfig, BlacklistStore, ConfigManager, Error, FileBlacklistStore, IndexError, MediaIndex,
    MediaQuery, MediaRow, MemoryBlacklist, Song, SongLoader, SortOrder, SqliteMediaIndex,
};
use tempfile::TempDir;

fn library() -> SqliteMediaIndex {
    let index = SqliteMediaIndex::open_in_memory().expect("open index");
    let tracks = [
        NewTrack::new("Yesterday", "/sdcard/Music/Beatles/yesterday.mp3")
            .with_artist(1, "The Beatles")
            .with_album(10, "Help!")
            .with_year(1965),
        NewTrack::new("Let It Be", "/sdcard/Music/Beatles/let_it_be.mp3")
            .with_artist(1, "The Beatles")
            .with_album(11, "Let It Be")
            .with_year(1970),
        NewTrack::new("Voice Memo", "/sdcard/Recordings/memo.m4a").with_year(2021),
        NewTrack::new("Notification", "/sdcard/Notifications/ding.ogg").not_music(),
        NewTrack::new("Odd", "/sdcard/100%_off/odd.mp3"),
    ];
    for track in &tracks {
        index.insert(track).expect("insert");
    }
    index
}

fn titles(songs: &[Song]) -> Vec<&str> {
    songs.iter().map(|s| s.title.as_str()).collect()
}

#[test]
fn test_blacklist_hides_directories() {
    let loader = SongLoader::new(library(), MemoryBlacklist::new(["/sdcard/Recordings"]));
    let songs = loader.all_songs().unwrap();
    assert_eq!(titles(&songs), vec!["Let It Be", "Odd", "Yesterday"]);
}

#[test]
fn test_empty_blacklist_returns_all_music() {
    let loader = SongLoader::new(library(), MemoryBlacklist::default());
    assert_eq!(loader.all_songs().unwrap().len(), 4);
}

#[test]
fn test_search_and_blacklist_combine() {
    let loader = SongLoader::new(
        library(),
        MemoryBlacklist::new(["/sdcard/Music/Beatles/let"]),
    );
    let songs = loader.search("e").unwrap();
    assert_eq!(titles(&songs), vec!["Voice Memo", "Yesterday"]);
}

#[test]
fn test_blacklist_path_wildcards_are_live() {
    // `%` and `_` in a blacklisted path keep their LIKE meaning.
    let loader = SongLoader::new(library(), MemoryBlacklist::new(["/sdcard/100%_off"]));
    let songs = loader.all_songs().unwrap();
    assert!(!titles(&songs).contains(&"Odd"));
}

#[test]
fn test_song_by_id() {
    let index = library();
    let id = index
        .insert(&NewTrack::new("Lookup", "/sdcard/Music/lookup.mp3").with_year(1999))
        .unwrap();
    let loader = SongLoader::new(index, MemoryBlacklist::default());

    let song = loader.song(id).unwrap();
    assert_eq!(song.title, "Lookup");
    assert_eq!(song.year, 1999);
    assert!(loader.song(9_999).unwrap().is_empty());
}

#[test]
fn test_song_by_id_respects_blacklist() {
    let index = library();
    let id = index
        .insert(&NewTrack::new("Secret", "/sdcard/Private/secret.mp3"))
        .unwrap();
    let loader = SongLoader::new(index, MemoryBlacklist::new(["/sdcard/Private"]));
    assert!(loader.song(id).unwrap().is_empty());
}

#[test]
fn test_sort_orders() {
    let loader = SongLoader::new(library(), MemoryBlacklist::new(["/sdcard/100%_off"]))
        .with_sort_order(SortOrder::YearDesc);
    assert_eq!(
        titles(&loader.all_songs().unwrap()),
        vec!["Voice Memo", "Let It Be", "Yesterday"]
    );

    let songs = loader
        .songs_sorted(None, None, SortOrder::TitleDesc)
        .unwrap();
    assert_eq!(titles(&songs), vec!["Yesterday", "Voice Memo", "Let It Be"]);
}

#[test]
fn test_file_blacklist_changes_are_seen_by_loader() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileBlacklistStore::open(dir.path().join("blacklist.json")).unwrap());
    let loader = SongLoader::new(library(), Arc::clone(&store));
    assert_eq!(loader.all_songs().unwrap().len(), 4);

    store.add_path("/sdcard/Music").unwrap();
    assert_eq!(
        titles(&loader.all_songs().unwrap()),
        vec!["Odd", "Voice Memo"]
    );

    store.clear().unwrap();
    assert_eq!(loader.all_songs().unwrap().len(), 4);
    assert!(store.paths().is_empty());
}

#[test]
fn test_config_drives_sort_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let mut manager = ConfigManager::at(&path).unwrap();
    manager.set_song_sort_order(SortOrder::Artist).unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    let loader = SongLoader::new(library(), MemoryBlacklist::default())
        .with_sort_order(config.song_sort_order);
    let songs = loader.all_songs().unwrap();
    // Untitled artists sort first, then The Beatles by title.
    assert_eq!(
        titles(&songs),
        vec!["Odd", "Voice Memo", "Let It Be", "Yesterday"]
    );
}

struct DeniedIndex;

impl MediaIndex for DeniedIndex {
    fn query(&self, _query: &MediaQuery) -> Result<Vec<MediaRow>, IndexError> {
        Err(IndexError::PermissionDenied("READ_MEDIA_AUDIO not granted".to_string()))
    }
}

struct BrokenIndex;

impl MediaIndex for BrokenIndex {
    fn query(&self, _query: &MediaQuery) -> Result<Vec<MediaRow>, IndexError> {
        Err(IndexError::Query("disk I/O error".to_string()))
    }
}

#[test]
fn test_permission_denied_degrades_to_empty() {
    let loader = SongLoader::new(DeniedIndex, MemoryBlacklist::new(["/x"]));
    assert!(loader.all_songs().unwrap().is_empty());
    assert!(loader.search("anything").unwrap().is_empty());
    assert!(loader.song(1).unwrap().is_empty());
}

#[test]
fn test_other_index_failures_propagate() {
    let loader = SongLoader::new(BrokenIndex, MemoryBlacklist::default());
    let err = loader.all_songs().unwrap_err();
    assert!(matches!(err, Error::MediaIndex(IndexError::Query(_))));
    assert!(!err.is_access_denied());
}
