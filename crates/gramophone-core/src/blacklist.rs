//! Blacklisted directories.
//!
//! A blacklisted path excludes every indexed file whose path starts with it.
//! Stores are passed explicitly to the [`SongLoader`](crate::SongLoader);
//! wrap one in an `Arc` to share it between a loader and a settings screen.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Source of blacklisted directory prefixes.
pub trait BlacklistStore: Send + Sync {
    /// Current blacklisted paths, in insertion order.
    fn paths(&self) -> Vec<String>;
}

impl<B: BlacklistStore + ?Sized> BlacklistStore for Arc<B> {
    fn paths(&self) -> Vec<String> {
        (**self).paths()
    }
}

impl<B: BlacklistStore + ?Sized> BlacklistStore for &B {
    fn paths(&self) -> Vec<String> {
        (**self).paths()
    }
}

/// Fixed, in-memory blacklist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBlacklist {
    paths: Vec<String>,
}

impl MemoryBlacklist {
    /// Create a blacklist from the given paths.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl BlacklistStore for MemoryBlacklist {
    fn paths(&self) -> Vec<String> {
        self.paths.clone()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BlacklistFile {
    #[serde(default)]
    paths: Vec<String>,
}

/// Blacklist persisted as a JSON file, saved after every change.
#[derive(Debug)]
pub struct FileBlacklistStore {
    file: PathBuf,
    paths: RwLock<Vec<String>>,
}

impl FileBlacklistStore {
    /// Open the store at `file`. A missing file is an empty blacklist.
    pub fn open(file: impl Into<PathBuf>) -> Result<Self> {
        let file = file.into();
        let paths = if file.exists() {
            let content = std::fs::read_to_string(&file).map_err(|e| Error::Blacklist {
                path: file.clone(),
                message: format!("Failed to read blacklist: {e}"),
            })?;
            let parsed: BlacklistFile =
                serde_json::from_str(&content).map_err(|e| Error::Blacklist {
                    path: file.clone(),
                    message: format!("Failed to parse blacklist: {e}"),
                })?;
            debug!(
                "Loaded {} blacklisted paths from {}",
                parsed.paths.len(),
                file.display()
            );
            parsed.paths
        } else {
            debug!("No blacklist at {}, starting empty", file.display());
            Vec::new()
        };

        Ok(Self {
            file,
            paths: RwLock::new(paths),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Add a directory. Returns `false` if it was already blacklisted.
    pub fn add_path(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let snapshot = {
            let mut paths = self.write_paths()?;
            if paths.contains(&path) {
                return Ok(false);
            }
            paths.push(path.clone());
            paths.clone()
        };
        self.save(&snapshot)?;
        info!("Blacklisted {}", path);
        Ok(true)
    }

    /// Remove a directory. Returns `false` if it was not blacklisted.
    pub fn remove_path(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref().to_string_lossy();
        let snapshot = {
            let mut paths = self.write_paths()?;
            let before = paths.len();
            paths.retain(|p| *p != path);
            if paths.len() == before {
                return Ok(false);
            }
            paths.clone()
        };
        self.save(&snapshot)?;
        info!("Removed {} from blacklist", path);
        Ok(true)
    }

    /// Remove every directory.
    pub fn clear(&self) -> Result<()> {
        self.write_paths()?.clear();
        self.save(&[])?;
        info!("Cleared blacklist");
        Ok(())
    }

    fn write_paths(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<String>>> {
        self.paths.write().map_err(|_| Error::Blacklist {
            path: self.file.clone(),
            message: "blacklist lock poisoned".to_string(),
        })
    }

    fn save(&self, paths: &[String]) -> Result<()> {
        if let Some(parent) = self.file.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::Blacklist {
                path: parent.to_path_buf(),
                message: format!("Failed to create blacklist directory: {e}"),
            })?;
        }

        let content = serde_json::to_string_pretty(&BlacklistFile {
            paths: paths.to_vec(),
        })?;
        std::fs::write(&self.file, content).map_err(|e| Error::Blacklist {
            path: self.file.clone(),
            message: format!("Failed to write blacklist: {e}"),
        })
    }
}

impl BlacklistStore for FileBlacklistStore {
    fn paths(&self) -> Vec<String> {
        match self.paths.read() {
            Ok(paths) => paths.clone(),
            Err(poisoned) => {
                warn!("Blacklist lock poisoned, reading last known paths");
                poisoned.into_inner().clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_blacklist_preserves_order() {
        let store = MemoryBlacklist::new(["/b", "/a"]);
        assert_eq!(store.paths(), vec!["/b", "/a"]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().expect("Should create temp dir");
        let store = FileBlacklistStore::open(dir.path().join("blacklist.json")).expect("open");
        assert!(store.paths().is_empty());
    }

    #[test]
    fn test_add_remove_persist() {
        let dir = TempDir::new().expect("Should create temp dir");
        let file = dir.path().join("nested").join("blacklist.json");

        let store = FileBlacklistStore::open(&file).expect("open");
        assert!(store.add_path("/sdcard/Ringtones").expect("add"));
        assert!(store.add_path("/sdcard/WhatsApp").expect("add"));
        assert!(!store.add_path("/sdcard/Ringtones").expect("add dup"));
        assert!(file.exists());

        let reopened = FileBlacklistStore::open(&file).expect("reopen");
        assert_eq!(
            reopened.paths(),
            vec!["/sdcard/Ringtones", "/sdcard/WhatsApp"]
        );

        assert!(reopened.remove_path("/sdcard/Ringtones").expect("remove"));
        assert!(!reopened.remove_path("/sdcard/Ringtones").expect("remove again"));
        assert_eq!(reopened.paths(), vec!["/sdcard/WhatsApp"]);

        reopened.clear().expect("clear");
        let reopened = FileBlacklistStore::open(&file).expect("reopen");
        assert!(reopened.paths().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().expect("Should create temp dir");
        let file = dir.path().join("blacklist.json");
        std::fs::write(&file, "not json").expect("write");

        let err = FileBlacklistStore::open(&file).expect_err("should fail");
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn test_shared_store_through_arc() {
        let dir = TempDir::new().expect("Should create temp dir");
        let store = Arc::new(
            FileBlacklistStore::open(dir.path().join("blacklist.json")).expect("open"),
        );
        let reader: Arc<dyn BlacklistStore> = store.clone();
        store.add_path("/music/private").expect("add");
        assert_eq!(reader.paths(), vec!["/music/private"]);
    }
}
