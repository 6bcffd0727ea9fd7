//! Tracing subscriber setup.
//!
//! Installs a registry with an `EnvFilter` and a single fmt layer. The filter
//! starts from the configured level and is overridden by `RUST_LOG` when set.
//! Output goes to stderr, or to a file through a non-blocking
//! `tracing-appender` writer whose guard must be kept alive by the caller.

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level used when neither the config nor `RUST_LOG` set one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging settings, the `[logging]` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `offlinemap=debug`.
    pub level: String,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log file path: {0}")]
    InvalidPath(PathBuf),

    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Keeps the background log writer flushing until dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = build_env_filter(&config.level);

    match &config.file {
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .try_init()
                .map_err(|e| LoggingError::Install(e.to_string()))?;
            Ok(LoggingGuard { _worker: None })
        }
        Some(path) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| LoggingError::InvalidPath(path.clone()))?;
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
                path: dir.clone(),
                source,
            })?;

            let appender = tracing_appender::rolling::never(&dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .try_init()
                .map_err(|e| LoggingError::Install(e.to_string()))?;
            Ok(LoggingGuard {
                _worker: Some(guard),
            })
        }
    }
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}
