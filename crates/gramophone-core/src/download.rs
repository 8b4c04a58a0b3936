//! Song downloading.
//!
//! Each download runs as its own tokio task. A shared semaphore bounds how many
//! transfers run at once, every task can be cancelled through its
//! [`DownloadHandle`], and each resolves to a [`DownloadOutcome`] or an error.
//! Progress is reported as [`DownloadEvent`]s on the manager's channel.
//!
//! ```rust,no_run
//! # async fn demo(song: gramophone_core::Song) -> gramophone_core::Result<()> {
//! use gramophone_core::config::DownloadConfig;
//! use gramophone_core::download::{DownloadManager, DownloadRequest};
//!
//! let manager = DownloadManager::new(&DownloadConfig::default())?;
//! let request = DownloadRequest::from_song(&song, "/music/downloads")?;
//! let outcome = manager.start(request).wait().await?;
//! println!("saved {} bytes to {}", outcome.bytes, outcome.path.display());
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{Mutex, Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Error, Result};
use crate::song::Song;

/// Unique identifier of a download.
pub type DownloadId = u64;

/// Extension given to downloaded files.
pub const DOWNLOAD_EXTENSION: &str = "mp3";

/// Replace characters that are invalid in file names and trim the result.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

    let sanitized: String = name
        .chars()
        .map(|c| if invalid_chars.contains(&c) { '_' } else { c })
        .collect();

    // Leave room for the extension.
    sanitized
        .trim()
        .trim_matches('.')
        .chars()
        .take(200)
        .collect()
}

/// A single file to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Source URL.
    pub url: String,
    /// Human-readable name for events and logs.
    pub title: String,
    /// Where the file is written.
    pub destination: PathBuf,
}

impl DownloadRequest {
    /// Download `song` into `directory` as `<artist>-<title>.mp3`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::NotRemote`] if the song has no remote URL.
    pub fn from_song(song: &Song, directory: impl AsRef<Path>) -> Result<Self> {
        let url = song.remote_url().ok_or_else(|| DownloadError::NotRemote {
            title: song.title.clone(),
        })?;
        let stem = sanitize_filename(&format!("{}-{}", song.artist_name, song.title));
        Ok(Self {
            url: url.to_string(),
            title: song.display_name(),
            destination: directory
                .as_ref()
                .join(format!("{stem}.{DOWNLOAD_EXTENSION}")),
        })
    }

    /// Requests for every remote song in `songs`; local songs are skipped.
    pub fn for_songs(songs: &[Song], directory: impl AsRef<Path>) -> Vec<Self> {
        songs
            .iter()
            .filter_map(|song| match Self::from_song(song, directory.as_ref()) {
                Ok(request) => Some(request),
                Err(e) => {
                    warn!("Skipping download: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// A finished download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// Download identifier.
    pub id: DownloadId,
    /// Written file.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// Events emitted while downloads run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DownloadEvent {
    /// The transfer acquired a slot and started.
    Started {
        /// Download identifier.
        id: DownloadId,
        /// Display title.
        title: String,
    },
    /// More bytes arrived.
    Progress {
        /// Download identifier.
        id: DownloadId,
        /// Bytes received so far.
        bytes: u64,
        /// Total size when the server announced it.
        total: Option<u64>,
        /// Percentage when the total is known.
        percent: Option<u8>,
    },
    /// The file was written completely.
    Completed {
        /// Download identifier.
        id: DownloadId,
        /// Written file.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// The transfer failed.
    Failed {
        /// Download identifier.
        id: DownloadId,
        /// Error message.
        error: String,
    },
    /// The transfer was cancelled.
    Cancelled {
        /// Download identifier.
        id: DownloadId,
    },
}

/// Handle to a running download.
#[derive(Debug)]
pub struct DownloadHandle {
    id: DownloadId,
    cancel: watch::Sender<bool>,
    task: JoinHandle<Result<DownloadOutcome>>,
}

impl DownloadHandle {
    /// Download identifier.
    #[must_use]
    pub const fn id(&self) -> DownloadId {
        self.id
    }

    /// Ask the download to stop. The partial file is removed and any existing
    /// file at the destination is left alone.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Whether the task has finished, successfully or not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the download to finish.
    ///
    /// # Errors
    ///
    /// Returns the download's error, [`DownloadError::Cancelled`] if it was
    /// cancelled, or a transfer failure if the task panicked.
    pub async fn wait(self) -> Result<DownloadOutcome> {
        // Keep the sender alive so the task does not see a closed channel.
        let _cancel = self.cancel;
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(Error::Download(DownloadError::TransferFailed {
                url: String::new(),
                reason: format!("download task aborted: {e}"),
            })),
        }
    }
}

/// Resolves once cancellation is requested; never resolves if the handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow() {
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn or_cancel<F: Future>(
    fut: F,
    cancel: &mut watch::Receiver<bool>,
) -> std::result::Result<F::Output, DownloadError> {
    tokio::select! {
        biased;
        () = cancelled(cancel) => Err(DownloadError::Cancelled),
        out = fut => Ok(out),
    }
}

struct Transfer {
    id: DownloadId,
    http: reqwest::Client,
    request: DownloadRequest,
    chunk_size: usize,
    events: mpsc::UnboundedSender<DownloadEvent>,
}

impl Transfer {
    fn emit(&self, event: DownloadEvent) {
        let _ = self.events.send(event);
    }

    /// Where bytes are streamed before the file is moved onto its destination.
    /// Unique per download so concurrent requests for one destination never
    /// share a partial file.
    fn part_path(&self) -> PathBuf {
        let destination = &self.request.destination;
        let stem = destination
            .file_stem()
            .map_or_else(|| "download".into(), |s| s.to_string_lossy());
        destination.with_file_name(format!("{stem}.{}.part", self.id))
    }

    async fn run(
        self,
        slots: Arc<Semaphore>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<DownloadOutcome> {
        let permit = match or_cancel(slots.acquire_owned(), &mut cancel).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(self.fail(DownloadError::TransferFailed {
                    url: self.request.url.clone(),
                    reason: "download manager shut down".to_string(),
                }));
            }
            Err(e) => return Err(self.fail(e)),
        };

        info!(
            "Starting download {}: {} -> {}",
            self.id,
            self.request.url,
            self.request.destination.display()
        );
        self.emit(DownloadEvent::Started {
            id: self.id,
            title: self.request.title.clone(),
        });

        let result = self.transfer(&mut cancel).await;
        drop(permit);

        match result {
            Ok(bytes) => {
                info!("Download {} completed ({} bytes)", self.id, bytes);
                self.emit(DownloadEvent::Completed {
                    id: self.id,
                    path: self.request.destination.clone(),
                    bytes,
                });
                Ok(DownloadOutcome {
                    id: self.id,
                    path: self.request.destination.clone(),
                    bytes,
                })
            }
            Err(e) => {
                let part = self.part_path();
                if let Err(rm) = tokio::fs::remove_file(&part).await
                    && rm.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to remove partial file {}: {}", part.display(), rm);
                }
                Err(self.fail(e))
            }
        }
    }

    fn fail(&self, e: DownloadError) -> Error {
        if e == DownloadError::Cancelled {
            info!("Download {} cancelled", self.id);
            self.emit(DownloadEvent::Cancelled { id: self.id });
        } else {
            error!("Download {} failed: {}", self.id, e);
            self.emit(DownloadEvent::Failed {
                id: self.id,
                error: e.to_string(),
            });
        }
        Error::Download(e)
    }

    async fn transfer(
        &self,
        cancel: &mut watch::Receiver<bool>,
    ) -> std::result::Result<u64, DownloadError> {
        let url = &self.request.url;
        let transfer_failed = |reason: String| DownloadError::TransferFailed {
            url: url.clone(),
            reason,
        };

        let mut response = or_cancel(self.http.get(url).send(), cancel)
            .await?
            .map_err(|e| transfer_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.clone(),
                status: status.as_u16(),
            });
        }
        let total = response.content_length();

        let destination = &self.request.destination;
        let part = self.part_path();
        let write_failed = |e: std::io::Error| DownloadError::WriteFailed {
            path: destination.clone(),
            reason: e.to_string(),
        };
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(write_failed)?;
        }
        let file = tokio::fs::File::create(&part)
            .await
            .map_err(write_failed)?;
        let mut file = BufWriter::with_capacity(self.chunk_size, file);

        let mut received = 0u64;
        let mut last_percent = None;
        while let Some(chunk) = or_cancel(response.chunk(), cancel)
            .await?
            .map_err(|e| transfer_failed(e.to_string()))?
        {
            file.write_all(&chunk).await.map_err(write_failed)?;
            received += chunk.len() as u64;

            let percent = total
                .filter(|t| *t > 0)
                .map(|t| ((received.min(t) * 100) / t) as u8);
            if percent.is_none() || percent != last_percent {
                last_percent = percent;
                self.emit(DownloadEvent::Progress {
                    id: self.id,
                    bytes: received,
                    total,
                    percent,
                });
            }
        }

        file.flush().await.map_err(write_failed)?;
        drop(file);
        tokio::fs::rename(&part, destination)
            .await
            .map_err(write_failed)?;
        debug!("Download {} wrote {} bytes", self.id, received);
        Ok(received)
    }
}

/// Runs downloads with a bound on how many transfer at once.
pub struct DownloadManager {
    http: reqwest::Client,
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    chunk_size: usize,
    next_id: AtomicU64,
    event_tx: mpsc::UnboundedSender<DownloadEvent>,
    event_rx: Mutex<mpsc::UnboundedReceiver<DownloadEvent>>,
}

impl DownloadManager {
    /// Create a manager from the download settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let mut config = config.clone();
        config.validate();

        let mut builder = reqwest::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let http = builder
            .build()
            .map_err(|e| Error::network_error(format!("Failed to create HTTP client: {e}")))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Ok(Self {
            http,
            slots: Arc::new(Semaphore::new(config.max_concurrent_downloads)),
            max_concurrent: config.max_concurrent_downloads,
            chunk_size: config.chunk_size,
            next_id: AtomicU64::new(0),
            event_tx,
            event_rx: Mutex::new(event_rx),
        })
    }

    /// Maximum number of transfers running at once.
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of free transfer slots.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Spawn a download. Must be called from within a tokio runtime.
    pub fn start(&self, request: DownloadRequest) -> DownloadHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel, cancel_rx) = watch::channel(false);
        debug!("Queued download {}: {}", id, request.url);

        let transfer = Transfer {
            id,
            http: self.http.clone(),
            request,
            chunk_size: self.chunk_size,
            events: self.event_tx.clone(),
        };
        let task = tokio::spawn(transfer.run(Arc::clone(&self.slots), cancel_rx));

        DownloadHandle { id, cancel, task }
    }

    /// Spawn one download per request.
    pub fn start_all(&self, requests: Vec<DownloadRequest>) -> Vec<DownloadHandle> {
        requests.into_iter().map(|r| self.start(r)).collect()
    }

    /// Receive the next event without waiting.
    pub async fn try_recv_event(&self) -> Option<DownloadEvent> {
        let mut rx = self.event_rx.lock().await;
        rx.try_recv().ok()
    }

    /// Wait for the next event.
    pub async fn next_event(&self) -> Option<DownloadEvent> {
        let mut rx = self.event_rx.lock().await;
        rx.recv().await
    }
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("max_concurrent", &self.max_concurrent)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}
