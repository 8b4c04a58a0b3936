//! Subscriber setup for applications embedding this crate.
//!
//! The crate itself only emits `tracing` events. Console output is
//! human-readable and honors `RUST_LOG`; the optional file output is JSON,
//! rotated by [`LogRotation`].

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "gramophone";

/// Log rotation frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    /// New file every hour.
    Hourly,
    /// New file every day.
    Daily,
    /// Single file.
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Never => Self::NEVER,
        }
    }
}

/// Where log output goes and how much of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directory for JSON log files; `None` logs to the console only.
    pub log_directory: Option<PathBuf>,
    /// Most verbose level printed for this crate on the console.
    pub console_level: Level,
    /// Most verbose level written to the log file.
    pub file_level: Level,
    /// File rotation.
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LoggingConfig {
    /// Debug console output, trace-level hourly files.
    #[must_use]
    pub fn development() -> Self {
        Self {
            log_directory: Some(default_log_directory()),
            console_level: Level::DEBUG,
            file_level: Level::TRACE,
            rotation: LogRotation::Hourly,
        }
    }

    /// Info console output, debug-level daily files.
    #[must_use]
    pub fn production() -> Self {
        Self {
            log_directory: Some(default_log_directory()),
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            rotation: LogRotation::Daily,
        }
    }

    /// [`development`](Self::development) in debug builds, otherwise
    /// [`production`](Self::production).
    #[must_use]
    pub fn auto() -> Self {
        if cfg!(debug_assertions) {
            Self::development()
        } else {
            Self::production()
        }
    }

    /// Write files into `path`.
    #[must_use]
    pub fn with_log_directory(mut self, path: PathBuf) -> Self {
        self.log_directory = Some(path);
        self
    }

    /// Log to the console only.
    #[must_use]
    pub fn console_only(mut self) -> Self {
        self.log_directory = None;
        self
    }

    /// Set the console level.
    #[must_use]
    pub const fn with_console_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }

    /// Set the file level.
    #[must_use]
    pub const fn with_file_level(mut self, level: Level) -> Self {
        self.file_level = level;
        self
    }

    /// Set file rotation.
    #[must_use]
    pub const fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Keeps file logging alive; dropping it flushes pending entries.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard").finish_non_exhaustive()
    }
}

/// Errors from [`init`].
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("Failed to create log directory {path}: {reason}")]
    DirectoryCreationFailed {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying error.
        reason: String,
    },

    /// A global subscriber was already set.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn").add_directive(crate_directive(config.console_level))
    });
    let console_layer = fmt::layer().with_filter(console_filter);

    let (file_layer, file_guard) = match &config.log_directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).map_err(|e| {
                LoggingError::DirectoryCreationFailed {
                    path: directory.clone(),
                    reason: e.to_string(),
                }
            })?;
            let appender =
                RollingFileAppender::new(config.rotation.into(), directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_filter =
                EnvFilter::new("warn").add_directive(crate_directive(config.file_level));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(file_filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// `<data_local_dir>/gramophone/logs`.
#[must_use]
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gramophone")
        .join("logs")
}

fn crate_directive(level: Level) -> Directive {
    format!("gramophone_core={}", level.as_str().to_ascii_lowercase())
        .parse()
        .unwrap_or_else(|_| LevelFilter::from_level(level).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let config = LoggingConfig::default();
        assert_eq!(config, LoggingConfig::production());
        assert_eq!(config.console_level, Level::INFO);
        assert_eq!(config.rotation, LogRotation::Daily);

        let config = LoggingConfig::development();
        assert_eq!(config.file_level, Level::TRACE);
        assert_eq!(config.rotation, LogRotation::Hourly);
    }

    #[test]
    fn test_config_builder() {
        let config = LoggingConfig::production()
            .with_console_level(Level::WARN)
            .with_file_level(Level::INFO)
            .with_rotation(LogRotation::Never)
            .with_log_directory(PathBuf::from("/tmp/gramophone-logs"));

        assert_eq!(config.console_level, Level::WARN);
        assert_eq!(config.file_level, Level::INFO);
        assert_eq!(config.rotation, LogRotation::Never);
        assert_eq!(
            config.log_directory,
            Some(PathBuf::from("/tmp/gramophone-logs"))
        );
        assert_eq!(config.console_only().log_directory, None);
    }

    #[test]
    fn test_crate_directive() {
        assert_eq!(
            crate_directive(Level::DEBUG).to_string(),
            "gramophone_core=debug"
        );
    }

    #[test]
    fn test_default_log_directory() {
        let dir = default_log_directory();
        assert!(dir.ends_with("gramophone/logs"));
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let config = LoggingConfig::production().with_log_directory(dir.path().to_path_buf());
        let first = init(&config);
        let second = init(&config.console_only());
        // Another test may already own the global subscriber; the second
        // call fails either way.
        assert!(second.is_err());
        drop(first);
    }
}
