//! Application configuration management.
//!
//! Handles loading, saving, and managing application-wide settings: the song
//! sort order, where downloads go, download limits and the remote playlist
//! source.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::query::SortOrder;

/// Default number of songs downloaded at once.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 2;

/// Minimum allowed concurrent downloads.
pub const MIN_CONCURRENT_DOWNLOADS: usize = 1;

/// Maximum allowed concurrent downloads.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 4;

/// Default size of the buffer downloads are written through, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Smallest accepted download buffer.
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// Largest accepted download buffer.
pub const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Default remote playlist.
pub const DEFAULT_PLAYLIST_URL: &str = "https://music.163.com/api/playlist/detail?id=3778678";

/// User agent the playlist API expects.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/4.0 (compatible; MSIE 7.0; Windows 7)";

/// Default connect/read timeout for remote requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Download settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Maximum number of concurrent downloads.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,
    /// Bytes buffered before each write to disk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Per-request timeout in seconds; 0 disables it.
    #[serde(default)]
    pub timeout_secs: u64,
}

const fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT_DOWNLOADS
}

const fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_secs: 0,
        }
    }
}

impl DownloadConfig {
    /// Clamp `max_concurrent_downloads` and `chunk_size` to their supported ranges.
    pub fn validate(&mut self) {
        self.max_concurrent_downloads = self
            .max_concurrent_downloads
            .clamp(MIN_CONCURRENT_DOWNLOADS, MAX_CONCURRENT_DOWNLOADS);
        self.chunk_size = self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
    }
}

/// Remote playlist source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Playlist detail endpoint.
    #[serde(default = "default_playlist_url")]
    pub playlist_url: String,
    /// User-Agent header sent with requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Connect and read timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_playlist_url() -> String {
    DEFAULT_PLAYLIST_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            playlist_url: default_playlist_url(),
            user_agent: default_user_agent(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Default ordering of song lists.
    #[serde(default)]
    pub song_sort_order: SortOrder,
    /// Directory downloaded songs are written to.
    #[serde(default = "default_download_directory")]
    pub download_directory: PathBuf,
    /// Where the blacklist is persisted.
    #[serde(default = "default_blacklist_file")]
    pub blacklist_file: PathBuf,
    /// Download settings.
    #[serde(default)]
    pub download: DownloadConfig,
    /// Remote playlist settings.
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            song_sort_order: SortOrder::default(),
            download_directory: default_download_directory(),
            blacklist_file: default_blacklist_file(),
            download: DownloadConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, or create it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();
        if !config_path.exists() {
            debug!("Config file not found, using defaults");
            let config = Self::default();
            if let Err(e) = config.save() {
                warn!("Failed to save default config: {}", e);
            }
            return Ok(config);
        }
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {e}")))?;
        config.download.validate();

        info!("Loaded config from {}", path.display());
        debug!(
            "Download directory: {}",
            config.download_directory.display()
        );
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Configuration(format!(
                    "Failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            Error::Configuration(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Update the download directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is relative, not a directory, or
    /// cannot be created.
    pub fn set_download_directory(&mut self, path: PathBuf) -> Result<()> {
        validate_download_directory(&path)?;
        self.download_directory = path;
        info!(
            "Updated download directory to: {}",
            self.download_directory.display()
        );
        Ok(())
    }

    /// Get the path to the config file.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        config_file_path()
    }
}

fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gramophone")
}

/// Get the default download directory.
#[must_use]
pub fn default_download_directory() -> PathBuf {
    dirs::audio_dir()
        .map(|dir| dir.join("Gramophone"))
        .unwrap_or_else(|| app_data_dir().join("downloads"))
}

/// Get the default blacklist file.
#[must_use]
pub fn default_blacklist_file() -> PathBuf {
    app_data_dir().join("blacklist.json")
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("gramophone")
        .join("config.json")
}

fn validate_download_directory(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(Error::Configuration(
            "Download directory must be an absolute path".to_string(),
        ));
    }

    if path.exists() {
        if !path.is_dir() {
            return Err(Error::Configuration(format!(
                "Path exists but is not a directory: {}",
                path.display()
            )));
        }
    } else {
        fs::create_dir_all(path).map_err(|e| {
            Error::Configuration(format!("Cannot create directory {}: {}", path.display(), e))
        })?;
    }

    Ok(())
}

/// Configuration manager that keeps the loaded config and where it lives.
#[derive(Debug)]
pub struct ConfigManager {
    path: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    /// Load config from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: config_file_path(),
            config: AppConfig::load()?,
        })
    }

    /// Load config from an explicit file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = AppConfig::load_from(&path)?;
        Ok(Self { path, config })
    }

    /// Get a reference to the current configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Replace and persist the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn update(&mut self, mut config: AppConfig) -> Result<()> {
        config.download.validate();
        self.config = config;
        self.config.save_to(&self.path)
    }

    /// Change and persist the song sort order.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn set_song_sort_order(&mut self, order: SortOrder) -> Result<()> {
        self.config.song_sort_order = order;
        self.config.save_to(&self.path)
    }

    /// Reset to default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn reset(&mut self) -> Result<()> {
        self.config = AppConfig::default();
        self.config.save_to(&self.path)
    }
}
