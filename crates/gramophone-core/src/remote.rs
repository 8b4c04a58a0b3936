//! Remote playlist fetching.
//!
//! Reads a playlist detail document (`{"result": {"tracks": [...]}}`) and turns
//! each track into a remote [`Song`] whose stream URL points at the service's
//! outer media endpoint.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::song::Song;

/// Stream URL template; the track id is appended.
pub const MEDIA_URL_PREFIX: &str = "http://music.163.com/song/media/outer/url?id=";

/// Stream URL for a track id.
#[must_use]
pub fn media_url(id: i64) -> String {
    format!("{MEDIA_URL_PREFIX}{id}")
}

fn track_id(track: &Value) -> Option<i64> {
    match track.get("id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_track(track: &Value) -> Option<Song> {
    let id = track_id(track)?;
    let name = track.get("name")?.as_str()?;
    let artist = track
        .get("artists")?
        .as_array()?
        .first()?
        .get("name")?
        .as_str()?;
    let artwork = track
        .get("album")
        .and_then(|album| album.get("blurPicUrl"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(Song::remote(id, name, artist, media_url(id), artwork))
}

/// Parse a playlist detail document into remote songs.
///
/// Tracks lacking an id, name or artist are skipped.
///
/// # Errors
///
/// Returns [`Error::InvalidResponse`] when the document has no track list.
pub fn parse_playlist(body: &str) -> Result<Vec<Song>> {
    let doc: Value = serde_json::from_str(body)?;

    // Some responses carry `result` as an embedded JSON string.
    let result = match doc.get("result") {
        Some(Value::String(embedded)) => serde_json::from_str(embedded)?,
        Some(value) => value.clone(),
        None => return Err(Error::InvalidResponse("missing 'result'".to_string())),
    };

    let tracks = result
        .get("tracks")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidResponse("missing 'result.tracks'".to_string()))?;

    let mut songs = Vec::with_capacity(tracks.len());
    for (i, track) in tracks.iter().enumerate() {
        match parse_track(track) {
            Some(song) => songs.push(song),
            None => warn!("Skipping malformed playlist track at index {}", i),
        }
    }
    debug!("Parsed {} of {} playlist tracks", songs.len(), tracks.len());
    Ok(songs)
}

/// Client for a remote playlist endpoint.
#[derive(Debug, Clone)]
pub struct RemotePlaylistClient {
    http: reqwest::Client,
    config: RemoteConfig,
}

impl RemotePlaylistClient {
    /// Build a client from the remote settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::network_error(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// The configured playlist URL.
    #[must_use]
    pub fn playlist_url(&self) -> &str {
        &self.config.playlist_url
    }

    /// Fetch and parse the configured playlist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] for transport failures and non-success
    /// statuses, [`Error::InvalidResponse`] or [`Error::Serialization`] for
    /// unexpected bodies.
    pub async fn fetch(&self) -> Result<Vec<Song>> {
        info!("Fetching remote playlist: {}", self.config.playlist_url);
        let response = self
            .http
            .get(&self.config.playlist_url)
            .send()
            .await
            .map_err(|e| Error::network_error(format!("Failed to fetch playlist: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network_error(format!(
                "Playlist request returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::network_error(format!("Failed to read playlist body: {e}")))?;
        let songs = parse_playlist(&body)?;
        info!("Fetched {} remote songs", songs.len());
        Ok(songs)
    }

    /// Like [`fetch`](Self::fetch), but logs failures and returns no songs.
    pub async fn fetch_or_empty(&self) -> Vec<Song> {
        match self.fetch().await {
            Ok(songs) => songs,
            Err(e) => {
                warn!("Remote playlist unavailable: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::UNKNOWN;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Answer a single request with `status` and `body`, handing back the
    /// request head the client sent.
    async fn serve_once(status: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (head_tx, head_rx) = oneshot::channel();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = vec![0u8; 4096];
            let mut seen = Vec::new();
            while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => seen.extend_from_slice(&buf[..n]),
                }
            }
            let _ = head_tx.send(String::from_utf8_lossy(&seen).into_owned());
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.flush().await;
        });
        (format!("http://{addr}/api/playlist/detail?id=1"), head_rx)
    }

    fn client_for(url: String, user_agent: &str) -> RemotePlaylistClient {
        RemotePlaylistClient::new(RemoteConfig {
            playlist_url: url,
            user_agent: user_agent.to_string(),
            timeout_secs: 5,
        })
        .expect("client")
    }

    const SAMPLE: &str = r#"{
        "code": 200,
        "result": {
            "name": "Hot",
            "tracks": [
                {
                    "id": 186016,
                    "name": "Qing Tian",
                    "artists": [{"name": "Jay Chou"}, {"name": "Someone"}],
                    "album": {"blurPicUrl": "http://p1.music.126.net/a.jpg"}
                },
                {
                    "id": "5257138",
                    "name": "No Album",
                    "artists": [{"name": "Artist"}]
                },
                {
                    "id": 3,
                    "name": "No Artists",
                    "artists": []
                },
                {
                    "name": "No Id",
                    "artists": [{"name": "X"}]
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_playlist_tracks() {
        let songs = parse_playlist(SAMPLE).expect("parse");
        assert_eq!(songs.len(), 2);

        let first = &songs[0];
        assert_eq!(first.id, 186_016);
        assert_eq!(first.title, "Qing Tian");
        assert_eq!(first.artist_name, "Jay Chou");
        assert_eq!(
            first.remote_url(),
            Some("http://music.163.com/song/media/outer/url?id=186016")
        );
        assert_eq!(first.path, first.remote_url().unwrap_or_default());
        assert_eq!(first.artwork_url(), Some("http://p1.music.126.net/a.jpg"));
        assert_eq!(first.album_id, UNKNOWN);
        assert_eq!(first.duration_ms, UNKNOWN);

        assert_eq!(songs[1].id, 5_257_138);
        assert_eq!(songs[1].artwork_url(), None);
    }

    #[test]
    fn test_parse_embedded_result_string() {
        let body = serde_json::json!({
            "result": serde_json::json!({
                "tracks": [{"id": 1, "name": "A", "artists": [{"name": "B"}]}]
            }).to_string()
        })
        .to_string();
        let songs = parse_playlist(&body).expect("parse");
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "A");
    }

    #[test]
    fn test_parse_missing_result() {
        let err = parse_playlist(r#"{"code": 404}"#).expect_err("should fail");
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_missing_tracks() {
        let err = parse_playlist(r#"{"result": {}}"#).expect_err("should fail");
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_not_json() {
        let err = parse_playlist("<html>").expect_err("should fail");
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_client_uses_config() {
        let config = RemoteConfig {
            playlist_url: "http://localhost:1/playlist".to_string(),
            ..RemoteConfig::default()
        };
        let client = RemotePlaylistClient::new(config).expect("client");
        assert_eq!(client.playlist_url(), "http://localhost:1/playlist");
    }

    #[tokio::test]
    async fn test_fetch_or_empty_swallows_errors() {
        let config = RemoteConfig {
            playlist_url: "http://127.0.0.1:1/playlist".to_string(),
            timeout_secs: 1,
            ..RemoteConfig::default()
        };
        let client = RemotePlaylistClient::new(config).expect("client");
        assert!(client.fetch_or_empty().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_parses_songs_and_sends_user_agent() {
        let (url, head) = serve_once("200 OK", SAMPLE.to_string()).await;
        let client = client_for(url, "GramophoneTest/1.0");

        let songs = client.fetch().await.expect("fetch");
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].title, "Qing Tian");
        assert!(songs.iter().all(Song::is_remote));

        let head = head.await.expect("request head").to_ascii_lowercase();
        assert!(head.starts_with("get /api/playlist/detail?id=1 "));
        assert!(head.contains("user-agent: gramophonetest/1.0\r\n"));
    }

    #[tokio::test]
    async fn test_fetch_error_status_is_network_error() {
        let (url, _head) = serve_once("500 Internal Server Error", "{}".to_string()).await;
        let client = client_for(url, crate::config::DEFAULT_USER_AGENT);

        let err = client.fetch().await.expect_err("should fail");
        assert!(matches!(err, Error::Network(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_fetch_or_empty_on_error_status() {
        let (url, _head) = serve_once("503 Service Unavailable", String::new()).await;
        let client = client_for(url, crate::config::DEFAULT_USER_AGENT);
        assert!(client.fetch_or_empty().await.is_empty());
    }
}
