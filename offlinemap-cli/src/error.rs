//! CLI error type.

use std::fmt;

use offlinemap::config::ConfigError;
use offlinemap::logging::LoggingError;
use offlinemap::provider::FetchError;
use offlinemap::store::StoreError;
use offlinemap::DownloadError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid.
    Config(String),
    /// A command-line argument is invalid.
    InvalidArgument(String),
    /// Logging could not be initialized.
    Logging(String),
    /// The HTTP client could not be created.
    Http(String),
    /// Package storage failed.
    Store(String),
    /// The download failed or was cancelled.
    Download(DownloadError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Logging(msg) => write!(f, "Logging error: {}", msg),
            CliError::Http(msg) => write!(f, "HTTP error: {}", msg),
            CliError::Store(msg) => write!(f, "Storage error: {}", msg),
            CliError::Download(e) => write!(f, "Download failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e.to_string())
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Http(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e.to_string())
    }
}

impl From<DownloadError> for CliError {
    fn from(e: DownloadError) -> Self {
        CliError::Download(e)
    }
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) => 2,
            CliError::Download(DownloadError::Cancelled) => 130,
            _ => 1,
        }
    }
}
